//! Routing outcomes that end a dispatch without a handler response, and the
//! configuration errors that stop a router from being built.

use thiserror::Error;

use crate::{Method, StatusCode};

/// Why a dispatch could not reach a handler.
///
/// Each variant maps to one terminal HTTP status via [`status`](Self::status).
/// A middleware rejecting a request is not an error; see
/// [`Dispatched::Halted`](super::Dispatched::Halted).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// No route at all is registered for the request verb.
    #[error("no routes registered for {method}")]
    NotImplemented { method: Method },

    /// Routes exist for the verb but none matches the path.
    #[error("no route matches {method} {path}")]
    NotFound { method: Method, path: String },

    /// The matched route names a controller that is not registered.
    #[error("controller `{controller}` is not registered")]
    BadRequest { controller: String },

    /// The controller exists but has no such action.
    #[error("controller `{controller}` has no action `{action}`")]
    MethodNotAllowed { controller: String, action: String },
}

impl RoutingError {
    /// The HTTP status this outcome surfaces as.
    ///
    /// # Examples
    ///
    /// ```
    /// use signpost::router::RoutingError;
    /// use signpost::{Method, StatusCode};
    ///
    /// let err = RoutingError::NotImplemented { method: Method::Delete };
    /// assert_eq!(err.status(), StatusCode::NotImplemented);
    /// ```
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotImplemented { .. } => StatusCode::NotImplemented,
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::BadRequest { .. } => StatusCode::BadRequest,
            Self::MethodNotAllowed { .. } => StatusCode::MethodNotAllowed,
        }
    }
}

/// Errors raised while building or configuring a [`Router`](super::Router).
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("the URL provided is not valid: {url}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: Option<url::ParseError>,
    },

    #[error("route template `{template}` does not compile: {source}")]
    Pattern {
        template: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid router configuration: {0}")]
    Config(#[from] serde_json::Error),
}
