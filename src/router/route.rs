//! Registered routes and the handlers they dispatch to.

use std::fmt;
use std::sync::Arc;

use super::pattern::Pattern;
use crate::context::Context;
use crate::{Method, Response};

/// Inline handler signature: receives the dispatch [`Context`] and returns a [`Response`].
pub type InlineHandler = Arc<dyn Fn(&Context<'_>) -> Response + Send + Sync + 'static>;

/// What a route dispatches to.
///
/// Strings convert into [`Handler::Action`] by splitting on the first `:`
/// (`"Web:home"` → controller `Web`, action `home`); closures go through
/// [`Handler::inline`].
///
/// # Examples
///
/// ```
/// use signpost::router::Handler;
/// use signpost::{Response, StatusCode};
///
/// let action = Handler::from("Web:register");
/// assert!(matches!(
///     &action,
///     Handler::Action { controller, action } if controller == "Web" && action == "register"
/// ));
///
/// let inline = Handler::inline(|_ctx| Response::new(StatusCode::NoContent));
/// assert!(matches!(inline, Handler::Inline(_)));
/// ```
#[derive(Clone)]
pub enum Handler {
    Inline(InlineHandler),
    /// A controller action resolved against the controller registry at dispatch time.
    Action { controller: String, action: String },
}

impl Handler {
    pub fn inline<F>(handler: F) -> Self
    where
        F: Fn(&Context<'_>) -> Response + Send + Sync + 'static,
    {
        Self::Inline(Arc::new(handler))
    }
}

impl From<&str> for Handler {
    fn from(spec: &str) -> Self {
        let (controller, action) = spec.split_once(':').unwrap_or((spec, ""));
        Self::Action {
            controller: controller.to_owned(),
            action: action.to_owned(),
        }
    }
}

impl From<String> for Handler {
    fn from(spec: String) -> Self {
        Self::from(spec.as_str())
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline(_) => f.write_str("Inline(..)"),
            Self::Action { controller, action } => write!(f, "Action({controller}:{action})"),
        }
    }
}

/// A registered route.
#[derive(Debug, Clone)]
pub struct Route {
    pub(crate) method: Method,
    pub(crate) template: String,
    pub(crate) pattern: Pattern,
    pub(crate) name: Option<String>,
    pub(crate) handler: Handler,
    pub(crate) middlewares: Vec<String>,
}

impl Route {
    /// The verb this route answers.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The full template, group prefix included, e.g. `/ops/{errcode}`.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The compiled pattern request paths are matched against.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Name used for reverse lookup, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// What the route dispatches to.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Middleware identifiers in the order they gate this route.
    pub fn middlewares(&self) -> &[String] {
        &self.middlewares
    }

    /// Placeholder names of the template, in order.
    pub fn placeholders(&self) -> &[String] {
        self.pattern.placeholders()
    }

    // Appends identifiers, skipping empty ones and ones already present.
    pub(crate) fn push_middlewares<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref().trim();
            if !id.is_empty() && !self.middlewares.iter().any(|m| m == id) {
                self.middlewares.push(id.to_owned());
            }
        }
    }
}

/// Handle on a freshly registered route, for naming it and attaching middleware.
///
/// # Examples
///
/// ```
/// use signpost::Router;
///
/// let mut router = Router::new("http://localhost:8040").unwrap();
/// router
///     .get("/cadastrar", "Web:register")
///     .unwrap()
///     .name("web.register")
///     .middleware("guest");
///
/// assert_eq!(router.url("web.register").as_deref(), Some("http://localhost:8040/cadastrar"));
/// ```
pub struct RouteRef<'a> {
    route: &'a mut Route,
}

impl<'a> RouteRef<'a> {
    pub(crate) fn new(route: &'a mut Route) -> Self {
        Self { route }
    }

    /// Name the route for reverse lookup.
    pub fn name(self, name: impl Into<String>) -> Self {
        self.route.name = Some(name.into());
        self
    }

    /// Append one middleware identifier after those inherited from the group.
    pub fn middleware(self, id: &str) -> Self {
        self.route.push_middlewares([id]);
        self
    }

    /// Append several middleware identifiers.
    pub fn middlewares<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.route.push_middlewares(ids);
        self
    }

    /// The route as stored.
    pub fn route(&self) -> &Route {
        &*self.route
    }
}
