//! Template rendering.
//!
//! Every file under the templates directory is loaded into one [`tera`]
//! environment, addressed by its path relative to that directory. Templates
//! can build links with `url_for`:
//!
//! ```text
//! <a href="{{ url_for(name="post", year=2024, slug=post.slug) }}">…</a>
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use tera::{Context, Tera, Value};
use tracing::debug;

use crate::error::Error;
use crate::pattern::{Param, Params};
use crate::router::UrlResolver;

struct State {
    tera: Tera,
    dir: PathBuf,
}

/// A shared handle on the template environment.
///
/// Provided by the built-in templates extension; fetch it with
/// `app.capability::<Templates>()`.
#[derive(Clone)]
pub struct Templates {
    state: Arc<RwLock<State>>,
    urls: UrlResolver,
}

impl Templates {
    /// Loads every template under `dir`. A missing directory gives an empty
    /// environment, so inline templates still work.
    pub fn new(dir: impl AsRef<Path>, urls: UrlResolver) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        let tera = load(&dir, &urls)?;
        Ok(Self { state: Arc::new(RwLock::new(State { tera, dir })), urls })
    }

    /// Renders the template called `name`.
    pub fn render(&self, name: &str, context: &Context) -> Result<String, Error> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.tera.render(name, context)?)
    }

    /// Renders a one-off template given as a string.
    pub fn render_str(&self, source: &str, context: &Context) -> Result<String, Error> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Ok(state.tera.render_str(source, context)?)
    }

    /// [`render`](Self::render) on the blocking pool.
    pub async fn render_async(&self, name: &str, context: Context) -> Result<String, Error> {
        let templates = self.clone();
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || templates.render(&name, &context))
            .await
            .map_err(Error::other)?
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.state.read().unwrap_or_else(PoisonError::into_inner).dir.clone()
    }

    /// Points the environment at another directory and reloads it.
    pub fn set_templates_dir(&self, dir: impl AsRef<Path>) -> Result<(), Error> {
        let dir = dir.as_ref().to_path_buf();
        let tera = load(&dir, &self.urls)?;
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = State { tera, dir };
        Ok(())
    }
}

impl fmt::Debug for Templates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Templates").field("dir", &self.templates_dir()).finish()
    }
}

fn load(dir: &Path, urls: &UrlResolver) -> Result<Tera, Error> {
    let mut tera = if dir.is_dir() {
        Tera::new(&format!("{}/**/*", dir.display()))?
    } else {
        Tera::default()
    };
    tera.register_function("url_for", UrlFor(urls.clone()));
    debug!(dir = %dir.display(), templates = tera.get_template_names().count(), "templates loaded");
    Ok(tera)
}

/// `url_for(name=..., **params)`. Output is marked safe so that links in
/// `.html` templates are not escaped.
struct UrlFor(UrlResolver);

impl tera::Function for UrlFor {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let name = args
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| tera::Error::msg("url_for: missing `name` argument"))?;

        let mut params = Params::new();
        for (key, value) in args.iter().filter(|(key, _)| *key != "name") {
            let param = match value {
                Value::String(s) => Param::from(s.as_str()),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Param::Int(i),
                    None => Param::Float(n.as_f64().unwrap_or_default()),
                },
                other => Param::Str(other.to_string()),
            };
            params.insert(key.as_str(), param);
        }

        self.0
            .url_for(name, &params)
            .map(Value::String)
            .map_err(|e| tera::Error::msg(format!("url_for(name={name:?}): {e}")))
    }

    fn is_safe(&self) -> bool {
        true
    }
}
