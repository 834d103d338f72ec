//! Redirect decisions.
//!
//! A handler that wants to redirect says so in its return value:
//!
//! ```rust
//! use tapa::{Flow, Params, Redirect};
//!
//! let flow = Flow::Redirect(Redirect::route("home", Params::new()).permanent());
//! # let _ = flow;
//! ```
//!
//! Dispatch sees the [`Flow::Redirect`] before any error handling happens and
//! replaces the in-progress response with a redirect response.

use crate::error::Error;
use crate::media::Media;
use crate::pattern::Params;
use crate::response::Response;
use crate::router::UrlResolver;

/// How a hook or handler finished.
#[derive(Clone, Debug, PartialEq)]
pub enum Flow {
    /// Carry on: run the remaining hooks and keep the response.
    Done,
    /// Stop here and answer with a redirect.
    Redirect(Redirect),
}

#[derive(Clone, Debug, PartialEq)]
enum Target {
    Url(String),
    Route { name: String, params: Params },
}

/// Where to redirect, and whether the move is permanent.
#[derive(Clone, Debug, PartialEq)]
pub struct Redirect {
    target: Target,
    permanent: bool,
}

impl Redirect {
    /// Redirect to a literal URL.
    pub fn to(url: impl Into<String>) -> Self {
        Self { target: Target::Url(url.into()), permanent: false }
    }

    /// Redirect to a named route. The name is resolved when the redirect is
    /// answered; an unknown name answers 404.
    pub fn route(name: impl Into<String>, params: Params) -> Self {
        Self { target: Target::Route { name: name.into(), params }, permanent: false }
    }

    /// `301` instead of `302`.
    pub fn permanent(mut self) -> Self {
        self.permanent = true;
        self
    }

    pub fn is_permanent(&self) -> bool {
        self.permanent
    }

    /// The redirect response, serializing with `media` like any other.
    pub(crate) fn into_response(self, urls: &UrlResolver, media: &Media) -> Result<Response, Error> {
        let url = match self.target {
            Target::Url(url) => url,
            Target::Route { name, params } => urls.url_for(&name, &params)?,
        };
        Ok(Response::redirect_with(media.clone(), &url, self.permanent))
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    #[test]
    fn url_redirect_is_temporary_by_default() {
        let res = Redirect::to("https://example.com").into_response(&UrlResolver::default(), &Media::default()).unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.header("location"), Some("https://example.com"));
    }

    #[test]
    fn unknown_route_name_is_not_found() {
        let err = Redirect::route("nowhere", Params::new())
            .permanent()
            .into_response(&UrlResolver::default(), &Media::default())
            .unwrap_err();
        assert_eq!(err.as_http().map(|e| e.status()), Some(StatusCode::NOT_FOUND));
    }
}
