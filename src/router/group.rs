//! Route groups: a shared path prefix and middleware list applied to every
//! route registered through the group value.

use super::error::RouterError;
use super::route::{Handler, RouteRef};
use super::Router;
use crate::Method;

/// Registration scope returned by [`Router::group`].
///
/// Routes added through a `Group` get the group's prefix in front of their
/// template and inherit the group's middlewares ahead of their own. Dropping
/// the group ends the scope; groups do not nest.
///
/// # Examples
///
/// ```
/// use signpost::{Method, Request, Response, Router, StatusCode};
/// use signpost::router::Handler;
///
/// let mut router = Router::new("https://example.com").unwrap();
/// {
///     let mut ops = router.group("/ops", &["log"]);
///     ops.get("/{errcode}", Handler::inline(|ctx| {
///         Response::new(StatusCode::Ok).body(ctx.params().get("errcode").unwrap_or_default().to_owned())
///     }))
///     .unwrap()
///     .name("web.error");
/// }
///
/// let route = router.routes().find(|r| r.name() == Some("web.error")).unwrap();
/// assert_eq!(route.template(), "/ops/{errcode}");
/// assert_eq!(route.middlewares(), ["log"]);
/// assert!(router.dispatch(&Request::new(Method::Get, "/404")).is_err());
/// ```
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
    middlewares: Vec<String>,
}

impl<'r> Group<'r> {
    pub(crate) fn new(router: &'r mut Router, prefix: &str, middlewares: &[&str]) -> Self {
        Self {
            router,
            prefix: prefix.trim_end_matches('/').to_owned(),
            middlewares: middlewares.iter().map(|m| (*m).to_owned()).collect(),
        }
    }

    /// The normalized prefix (no trailing `/`).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register a route under this group. See [`Router::add_route`].
    pub fn add_route(
        &mut self,
        method: Method,
        template: &str,
        handler: impl Into<Handler>,
        name: Option<&str>,
        middlewares: &[&str],
    ) -> Result<RouteRef<'_>, RouterError> {
        let template = format!("{}{}", self.prefix, template);
        let route = self
            .router
            .insert_route(method, &template, handler.into(), &self.middlewares)?;
        let route = match name {
            Some(name) => route.name(name),
            None => route,
        };
        Ok(route.middlewares(middlewares))
    }

    /// Register a handler for `GET` requests matching the group prefix
    /// followed by `template`. See [`Router::get`].
    pub fn get(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Get, template, handler, None, &[])
    }

    /// Register a handler for `POST` requests matching the group prefix
    /// followed by `template`. See [`Router::post`].
    pub fn post(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Post, template, handler, None, &[])
    }

    /// Register a handler for `PUT` requests matching the group prefix
    /// followed by `template`. See [`Router::put`].
    pub fn put(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Put, template, handler, None, &[])
    }

    /// Register a handler for `PATCH` requests matching the group prefix
    /// followed by `template`. See [`Router::patch`].
    pub fn patch(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Patch, template, handler, None, &[])
    }

    /// Register a handler for `DELETE` requests matching the group prefix
    /// followed by `template`. See [`Router::delete`].
    pub fn delete(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Delete, template, handler, None, &[])
    }
}
