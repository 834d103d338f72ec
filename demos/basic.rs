//! Minimal tapa example: JSON endpoints, a class-based view, hooks, a
//! redirect, a custom error handler and request tracing.
//!
//! Run with:
//!   cargo run --example basic
//!
//! Try:
//!   curl http://localhost:8000/items/42
//!   curl http://localhost:8000/items/abc          # 404, not an int
//!   curl -X PUT http://localhost:8000/greet/ada
//!   curl -i http://localhost:8000/home            # 301 to /
//!   curl -i -X DELETE http://localhost:8000/      # 405

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tapa::middleware::{Layer, Trace};
use tapa::{
    App, BoxFuture, Config, Error, ErrorKind, Flow, HttpError, Outcome, Params, Redirect, Request, Response, Server,
    StatusCode, Verbs, View,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let mut app = App::new(Config::default())?;
    app.add_middleware(Layer::common(Trace));

    app.route("/").methods(["get"]).name("index").to(|_req, res, _p| {
        Box::pin(async move {
            res.set_media(&serde_json::json!({ "hello": "world" }))?;
            Ok(Flow::Done)
        })
    })?;

    // GET /items/{item_id:int}; anything that is not an integer is a 404.
    app.route("/items/{item_id:int}")
        .methods(["get"])
        .name("item")
        .after(|_req, res, _p| {
            res.set_header("cache-control", "max-age=60");
            Box::pin(async { Ok(Flow::Done) })
        })
        .to(|_req, res, p| {
            Box::pin(async move {
                let id = p.int("item_id").unwrap_or_default();
                if id == 0 {
                    return Err(Error::from(HttpError::with_detail(StatusCode::NOT_FOUND, "item 0 does not exist")));
                }
                res.set_media(&serde_json::json!({ "id": id }))?;
                Ok(Flow::Done)
            })
        })?;

    let visits = Arc::new(AtomicU64::new(0));
    app.route("/greet/{person}").view(Greet { visits })?;

    app.route("/home").to(|_req, _res, _p| {
        Box::pin(async { Ok(Flow::Redirect(Redirect::route("index", Params::new()).permanent())) })
    })?;

    app.add_error_handler(ErrorKind::Status(StatusCode::METHOD_NOT_ALLOWED), |req, res, _err| {
        res.set_status(StatusCode::METHOD_NOT_ALLOWED);
        res.set_text(format!("{} is not allowed on {}", req.method(), req.path()));
    });

    Server::from_env()?.serve(app).await
}

struct Greet {
    visits: Arc<AtomicU64>,
}

impl Greet {
    fn reply<'a>(&'a self, verb: &'static str, res: &'a mut Response, p: &'a Params) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let n = self.visits.fetch_add(1, Ordering::Relaxed) + 1;
            let person = p.str("person").unwrap_or("stranger");
            res.set_text(format!("{verb} {person} (#{n})"));
            Ok(Flow::Done)
        })
    }
}

impl View for Greet {
    fn operations(verbs: &mut Verbs<Self>) {
        verbs.get(Self::hello).put(Self::welcome);
    }
}

impl Greet {
    fn hello<'a>(&'a self, _req: &'a Request, res: &'a mut Response, p: &'a Params) -> BoxFuture<'a, Outcome> {
        self.reply("Hello,", res, p)
    }

    fn welcome<'a>(&'a self, _req: &'a Request, res: &'a mut Response, p: &'a Params) -> BoxFuture<'a, Outcome> {
        self.reply("Welcome,", res, p)
    }
}
