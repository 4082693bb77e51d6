//! Request routing — map verb + path to handlers, gate them with middleware,
//! and generate URLs back from route names.
//!
//! Templates are literal paths with `{name}` placeholders:
//!
//! | Template           | Example match        | Parameters                  |
//! |--------------------|----------------------|-----------------------------|
//! | `/`                | `/`                  | *(none)*                    |
//! | `/register/{id}`   | `/register/42`       | `id → "42"`                 |
//! | `/ops/{errcode}`   | `/ops/404`           | `errcode → "404"`           |
//!
//! Trailing slashes are ignored on templates and request paths alike.
//!
//! Within one verb, routes are tested in registration order and the **last**
//! matching route wins, so a later registration shadows an earlier one that
//! overlaps it. Re-registering an identical template replaces the earlier
//! route in its original position.
//!
//! Handlers are either inline closures or `"Controller:action"` strings
//! resolved against the controllers registered with [`Router::controller`].

use std::borrow::Cow;

use tracing::{debug, warn};
use ::url::Url;

use crate::config::RouterConfig;
use crate::context::{Context, Parameters};
use crate::controller::{Controller, ControllerRegistry, qualify};
use crate::middleware::{Middleware, MiddlewareRegistry};
use crate::{Method, Request, Response, StatusCode};

mod error;
mod group;
mod pattern;
mod route;
mod table;
mod url;

pub use error::{RouterError, RoutingError};
pub use group::Group;
pub use pattern::Pattern;
pub use route::{Handler, InlineHandler, Route, RouteRef};
pub use table::RouteTable;

/// Successful end of a dispatch.
#[derive(Debug)]
pub enum Dispatched {
    /// The handler ran and produced this response.
    Handled(Response),
    /// A middleware rejected the request, optionally attaching a response
    /// (typically a redirect) for the client.
    Halted(Option<Response>),
}

/// Named-route HTTP router.
///
/// Registration takes `&mut self`; dispatch and reverse lookup take `&self`,
/// so a fully registered router can be shared (e.g. behind an `Arc`) by a
/// transport.
///
/// # Examples
///
/// ```rust
/// use signpost::router::{Dispatched, Handler};
/// use signpost::{Method, Request, Response, Router, StatusCode};
///
/// let mut router = Router::new("http://localhost:8040").unwrap();
/// router
///     .post("/register/{id}", Handler::inline(|ctx| {
///         let id = ctx.params().get("id").unwrap_or_default().to_owned();
///         Response::new(StatusCode::Created).body(id)
///     }))
///     .unwrap()
///     .name("web.register.post");
///
/// let outcome = router.dispatch(&Request::new(Method::Post, "/register/42")).unwrap();
/// let Dispatched::Handled(response) = outcome else { panic!("halted") };
/// assert_eq!(response.content(), b"42");
///
/// assert_eq!(
///     router.url_for("web.register.post", [("id", 7)]).as_deref(),
///     Some("http://localhost:8040/register/7"),
/// );
/// ```
#[derive(Debug)]
pub struct Router {
    base_url: String,
    namespace: String,
    error_route: Option<String>,
    routes: RouteTable,
    controllers: ControllerRegistry,
    middlewares: MiddlewareRegistry,
}

impl Router {
    /// Create an empty router whose generated URLs start with `base_url`.
    ///
    /// # Errors
    ///
    /// [`RouterError::InvalidBaseUrl`] unless `base_url` is an absolute URL
    /// with a host, e.g. `http://localhost:8040/app`.
    ///
    /// # Examples
    ///
    /// ```
    /// use signpost::Router;
    ///
    /// assert!(Router::new("http://localhost:8040/router/examples").is_ok());
    /// assert!(Router::new("not a url").is_err());
    /// ```
    pub fn new(base_url: &str) -> Result<Self, RouterError> {
        Ok(Self {
            base_url: validate_base_url(base_url)?,
            namespace: String::new(),
            error_route: None,
            routes: RouteTable::new(),
            controllers: ControllerRegistry::new(),
            middlewares: MiddlewareRegistry::new(),
        })
    }

    /// Create a router from a deserialized [`RouterConfig`].
    pub fn from_config(config: RouterConfig) -> Result<Self, RouterError> {
        let mut router = Self::new(&config.base_url)?;
        if let Some(namespace) = &config.namespace {
            router.namespace(namespace);
        }
        if let Some(name) = config.error_route {
            router.error_route(name);
        }
        Ok(router)
    }

    /// Set the namespace `"Controller:action"` handlers are qualified with.
    pub fn namespace(&mut self, namespace: &str) -> &mut Self {
        self.namespace = namespace.trim_end_matches("::").to_owned();
        self
    }

    /// Name the route [`respond`](Self::respond) redirects routing errors to,
    /// with `errcode` set to the status code.
    pub fn error_route(&mut self, name: impl Into<String>) -> &mut Self {
        self.error_route = Some(name.into());
        self
    }

    /// The validated base URL, without a trailing `/`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register a controller type under its fully-qualified identifier.
    pub fn controller<C: 'static>(&mut self, controller: Controller<C>) -> &mut Self {
        self.controllers.register(controller);
        self
    }

    /// Register middleware `M` under `id`, constructed with [`Default`].
    pub fn middleware<M>(&mut self, id: &str) -> &mut Self
    where
        M: Middleware + Default + 'static,
    {
        self.middlewares.register::<M>(id);
        self
    }

    /// Direct access to the middleware registry, for constructor or closure gates.
    pub fn middlewares_mut(&mut self) -> &mut MiddlewareRegistry {
        &mut self.middlewares
    }

    /// Open a registration scope with a path prefix and inherited middlewares.
    ///
    /// An empty prefix applies only the middlewares.
    pub fn group(&mut self, prefix: &str, middlewares: &[&str]) -> Group<'_> {
        Group::new(self, prefix, middlewares)
    }

    /// Register a route.
    ///
    /// `handler` is a [`Handler`], or a `"Controller:action"` string. The
    /// template's trailing `/` is dropped; an identical compiled template for
    /// the same verb replaces the earlier route.
    ///
    /// # Errors
    ///
    /// [`RouterError::Pattern`] if the template cannot be compiled.
    pub fn add_route(
        &mut self,
        method: Method,
        template: &str,
        handler: impl Into<Handler>,
        name: Option<&str>,
        middlewares: &[&str],
    ) -> Result<RouteRef<'_>, RouterError> {
        let route = self.insert_route(method, template, handler.into(), &[])?;
        let route = match name {
            Some(name) => route.name(name),
            None => route,
        };
        Ok(route.middlewares(middlewares))
    }

    /// Register a handler for `GET` requests matching `template`.
    ///
    /// # Arguments
    ///
    /// - `template` — route template with `{name}` placeholders (e.g. `"/cadastrar"`).
    /// - `handler` — a [`Handler`], or a `"Controller:action"` string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use signpost::Router;
    ///
    /// let mut router = Router::new("http://localhost:8040").unwrap();
    /// router.get("/cadastrar", "Web:register").unwrap().name("web.register");
    /// assert_eq!(router.len(), 1);
    /// ```
    pub fn get(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Get, template, handler, None, &[])
    }

    /// Register a handler for `POST` requests matching `template`.
    ///
    /// # Arguments
    ///
    /// - `template` — route template with `{name}` placeholders (e.g. `"/cadastrar/{id}"`).
    /// - `handler` — a [`Handler`], or a `"Controller:action"` string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use signpost::Router;
    ///
    /// let mut router = Router::new("http://localhost:8040").unwrap();
    /// router.post("/cadastrar/{id}", "Web:register").unwrap().name("web.register.post");
    /// assert_eq!(router.len(), 1);
    /// ```
    pub fn post(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Post, template, handler, None, &[])
    }

    /// Register a handler for `PUT` requests matching `template`.
    ///
    /// # Arguments
    ///
    /// - `template` — route template with `{name}` placeholders (e.g. `"/items/{id}"`).
    /// - `handler` — a [`Handler`], or a `"Controller:action"` string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use signpost::Router;
    ///
    /// let mut router = Router::new("http://localhost:8040").unwrap();
    /// router.put("/items/{id}", "Items:update").unwrap().name("items.update");
    /// assert_eq!(router.len(), 1);
    /// ```
    pub fn put(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Put, template, handler, None, &[])
    }

    /// Register a handler for `PATCH` requests matching `template`.
    ///
    /// # Arguments
    ///
    /// - `template` — route template with `{name}` placeholders (e.g. `"/items/{id}"`).
    /// - `handler` — a [`Handler`], or a `"Controller:action"` string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use signpost::Router;
    ///
    /// let mut router = Router::new("http://localhost:8040").unwrap();
    /// router.patch("/items/{id}", "Items:patch").unwrap().name("items.patch");
    /// assert_eq!(router.len(), 1);
    /// ```
    pub fn patch(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Patch, template, handler, None, &[])
    }

    /// Register a handler for `DELETE` requests matching `template`.
    ///
    /// # Arguments
    ///
    /// - `template` — route template with `{name}` placeholders (e.g. `"/items/{id}"`).
    /// - `handler` — a [`Handler`], or a `"Controller:action"` string.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use signpost::Router;
    ///
    /// let mut router = Router::new("http://localhost:8040").unwrap();
    /// router.delete("/items/{id}", "Items:destroy").unwrap().name("items.destroy");
    /// assert_eq!(router.len(), 1);
    /// ```
    pub fn delete(
        &mut self,
        template: &str,
        handler: impl Into<Handler>,
    ) -> Result<RouteRef<'_>, RouterError> {
        self.add_route(Method::Delete, template, handler, None, &[])
    }

    pub(crate) fn insert_route(
        &mut self,
        method: Method,
        template: &str,
        handler: Handler,
        inherited: &[String],
    ) -> Result<RouteRef<'_>, RouterError> {
        let template = normalize_path(template).to_owned();
        let pattern = Pattern::compile(&template).map_err(|source| RouterError::Pattern {
            template: template.clone(),
            source,
        })?;

        debug!(
            method = %method,
            template = %template,
            pattern = %pattern.as_str(),
            handler = ?handler,
            "route registered"
        );

        let mut route = Route {
            method,
            template,
            pattern,
            name: None,
            handler,
            middlewares: Vec::new(),
        };
        route.push_middlewares(inherited);

        Ok(RouteRef::new(self.routes.insert(route)))
    }

    /// All registered routes, grouped by verb in first-registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    /// Number of registered routes across all verbs.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no route has been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Route `request` to its handler.
    ///
    /// 1. No routes for the verb → [`RoutingError::NotImplemented`].
    /// 2. The last route whose pattern matches the normalized path is selected;
    ///    none → [`RoutingError::NotFound`].
    /// 3. Parameters are merged: query < body < path placeholders. POST bodies
    ///    are read immediately; PUT/PATCH/DELETE bodies only once the
    ///    middleware gate has passed.
    /// 4. Middleware rejecting → `Ok(Dispatched::Halted(..))`.
    /// 5. Inline handlers run with the [`Context`]; controller actions resolve
    ///    to [`RoutingError::BadRequest`] for an unknown controller,
    ///    [`RoutingError::MethodNotAllowed`] for an unknown action, or run with
    ///    the merged [`Parameters`].
    pub fn dispatch(&self, request: &Request) -> Result<Dispatched, RoutingError> {
        let outcome = self.dispatch_inner(request);
        if let Err(e) = &outcome {
            warn!(
                method = %request.method(),
                path = %request.path(),
                status = e.status().as_u16(),
                error = %e,
                "dispatch failed"
            );
        }
        outcome
    }

    fn dispatch_inner(&self, request: &Request) -> Result<Dispatched, RoutingError> {
        let method = request.method();
        if self.routes.routes_for(method).is_empty() {
            return Err(RoutingError::NotImplemented {
                method: method.clone(),
            });
        }

        let path = normalize_path(request.path());
        let Some((route, captures)) = self.routes.find_match(method, path) else {
            return Err(RoutingError::NotFound {
                method: method.clone(),
                path: path.to_owned(),
            });
        };

        debug!(
            method = %method,
            path = %path,
            route = %route.template(),
            "route matched"
        );

        let params = extract_parameters(request, route, &captures);
        let mut ctx = Context::new(self, request, route, params);

        if !self.middlewares.run_gate(route.middlewares(), &mut ctx) {
            return Ok(Dispatched::Halted(ctx.take_response()));
        }

        ctx.resolve_deferred_body();

        match route.handler() {
            Handler::Inline(handler) => Ok(Dispatched::Handled(handler(&ctx))),
            Handler::Action { controller, action } => {
                let id = qualify(&self.namespace, controller);
                let Some(target) = self.controllers.resolve(&id) else {
                    return Err(RoutingError::BadRequest { controller: id });
                };
                match target.invoke(self, action, ctx.params()) {
                    Some(response) => Ok(Dispatched::Handled(response)),
                    None => Err(RoutingError::MethodNotAllowed {
                        controller: id,
                        action: action.clone(),
                    }),
                }
            }
        }
    }

    /// Dispatch and turn every outcome into a response.
    ///
    /// - handled → the handler's response;
    /// - halted → the middleware's response, or `403 Forbidden` if it set none;
    /// - routing error → a redirect to the [`error_route`](Self::error_route)
    ///   with `errcode=<status>` when one is set and resolves, otherwise a bare
    ///   response carrying the status.
    pub fn respond(&self, request: &Request) -> Response {
        match self.dispatch(request) {
            Ok(Dispatched::Handled(response)) => response,
            Ok(Dispatched::Halted(response)) => {
                response.unwrap_or_else(|| Response::new(StatusCode::Forbidden))
            }
            Err(e) => {
                let status = e.status();
                self.error_route
                    .as_deref()
                    .and_then(|name| self.redirect(name, [("errcode", status.as_u16())]))
                    .unwrap_or_else(|| Response::new(status).body(status.canonical_reason()))
            }
        }
    }

    /// URL of the route named `name`, with its template left as registered.
    ///
    /// # Examples
    ///
    /// ```
    /// use signpost::Router;
    ///
    /// let mut router = Router::new("http://localhost:8040").unwrap();
    /// router.get("/ops/{errcode}", "Web:error").unwrap().name("web.error");
    ///
    /// assert_eq!(router.url("web.error").as_deref(), Some("http://localhost:8040/ops/{errcode}"));
    /// assert_eq!(router.url("nope"), None);
    /// ```
    pub fn url(&self, name: &str) -> Option<String> {
        self.routes
            .find_named(name)
            .map(|route| format!("{}{}", self.base_url, route.template()))
    }

    /// URL of the route named `name`, filling placeholders from `data`.
    ///
    /// Keys that name a placeholder are substituted into the path; every
    /// other key is appended to the query string in the given order.
    ///
    /// # Examples
    ///
    /// ```
    /// use signpost::Router;
    ///
    /// let mut router = Router::new("https://shop.test").unwrap();
    /// router.get("/items/{id}", "Items:show").unwrap().name("items.show");
    ///
    /// assert_eq!(
    ///     router.url_for("items.show", [("id", "7"), ("tab", "reviews")]).as_deref(),
    ///     Some("https://shop.test/items/7?tab=reviews"),
    /// );
    /// ```
    pub fn url_for<I, K, V>(&self, name: &str, data: I) -> Option<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        let route = self.routes.find_named(name)?;
        Some(url::build(&self.base_url, route, data))
    }

    /// A `302 Found` response towards the route named `target`, or towards
    /// `target` itself when it is an absolute URL rather than a route name.
    ///
    /// Returns `None` when `target` is neither; callers that must redirect
    /// need to handle that case.
    pub fn redirect<I, K, V>(&self, target: &str, data: I) -> Option<Response>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        if let Some(location) = self.url_for(target, data) {
            return Some(Response::redirect(location));
        }
        match Url::parse(target) {
            Ok(url) if url.has_host() => Some(Response::redirect(target)),
            _ => {
                debug!(target = %target, "redirect target did not resolve");
                None
            }
        }
    }
}

fn validate_base_url(raw: &str) -> Result<String, RouterError> {
    let parsed = Url::parse(raw).map_err(|e| RouterError::InvalidBaseUrl {
        url: raw.to_owned(),
        source: Some(e),
    })?;
    if parsed.cannot_be_a_base() || !parsed.has_host() {
        return Err(RouterError::InvalidBaseUrl {
            url: raw.to_owned(),
            source: None,
        });
    }
    Ok(raw.trim_end_matches('/').to_owned())
}

// Drops trailing slashes; the root path stays `/`.
fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn extract_parameters(request: &Request, route: &Route, captures: &[&str]) -> Parameters {
    let mut params: Parameters = request.query_params().iter().cloned().collect();

    if *request.method() == Method::Post {
        match request.body_fields() {
            Ok(fields) => params.extend(fields),
            Err(e) => warn!(path = %request.path(), error = %e, "ignoring undecodable POST body"),
        }
    }

    for (name, &raw) in route.placeholders().iter().zip(captures) {
        let value = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
        params.insert(name.as_str(), value.into_owned());
    }

    params
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    const BASE: &str = "http://localhost:8040/router/examples";

    fn router() -> Router {
        Router::new(BASE).unwrap()
    }

    fn text(status: StatusCode, body: &'static str) -> Handler {
        Handler::inline(move |_| Response::new(status).body(body))
    }

    // Handler that echoes one parameter back.
    fn echo(key: &'static str) -> Handler {
        Handler::inline(move |ctx| {
            Response::new(StatusCode::Ok).body(ctx.params().get(key).unwrap_or("<none>").to_owned())
        })
    }

    fn handled(outcome: Result<Dispatched, RoutingError>) -> Response {
        match outcome {
            Ok(Dispatched::Handled(response)) => response,
            other => panic!("expected a handled dispatch, got {other:?}"),
        }
    }

    fn body(response: &Response) -> &str {
        std::str::from_utf8(response.content()).unwrap()
    }

    fn get(path: &str) -> Request {
        Request::new(Method::Get, path)
    }

    // ── Construction ─────────────────────────────────────────────────────────

    #[test]
    fn malformed_base_url_fails_fast() {
        for bad in ["not a url", "", "/relative/path", "mailto:someone@example.com"] {
            assert!(
                matches!(Router::new(bad), Err(RouterError::InvalidBaseUrl { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let router = Router::new("http://localhost:8040/").unwrap();
        assert_eq!(router.base_url(), "http://localhost:8040");
    }

    // ── Registration ─────────────────────────────────────────────────────────

    #[test]
    fn registration_counts_and_overwrites() {
        let mut r = router();
        assert!(r.is_empty());
        r.get("/a", "Web:a").unwrap();
        r.post("/a", "Web:a").unwrap();
        r.get("/a/", "Web:b").unwrap();
        assert_eq!(r.len(), 2);
        let first = r.routes().next().unwrap();
        assert!(matches!(first.handler(), Handler::Action { action, .. } if action == "b"));
    }

    #[test]
    fn add_route_with_name_and_middlewares() {
        let mut r = router();
        r.add_route(Method::Put, "/items/{id}", "Items:update", Some("items.update"), &["auth", "", "auth"])
            .unwrap();
        let route = r.routes().next().unwrap();
        assert_eq!(route.name(), Some("items.update"));
        assert_eq!(route.middlewares(), ["auth"]);
        assert_eq!(route.placeholders(), ["id"]);
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    #[test]
    fn exact_route_is_handled() {
        let mut r = router();
        r.get("/", text(StatusCode::Ok, "home")).unwrap();
        r.get("/cadastrar", text(StatusCode::Ok, "form")).unwrap();

        assert_eq!(body(&handled(r.dispatch(&get("/")))), "home");
        assert_eq!(body(&handled(r.dispatch(&get("/cadastrar")))), "form");
        assert_eq!(body(&handled(r.dispatch(&get("/cadastrar/")))), "form");
    }

    #[test]
    fn no_routes_for_verb_is_not_implemented() {
        let mut r = router();
        r.get("/", text(StatusCode::Ok, "home")).unwrap();
        let err = r.dispatch(&Request::new(Method::Delete, "/")).unwrap_err();
        assert_eq!(err, RoutingError::NotImplemented { method: Method::Delete });
        assert_eq!(err.status(), StatusCode::NotImplemented);

        let err = router().dispatch(&get("/")).unwrap_err();
        assert_eq!(err.status(), StatusCode::NotImplemented);
    }

    #[test]
    fn unmatched_path_is_not_found() {
        let mut r = router();
        r.get("/", text(StatusCode::Ok, "home")).unwrap();
        let err = r.dispatch(&get("/missing")).unwrap_err();
        assert_eq!(
            err,
            RoutingError::NotFound {
                method: Method::Get,
                path: "/missing".to_owned()
            }
        );
    }

    #[test]
    fn placeholder_is_extracted() {
        let mut r = router();
        r.post("/register/{id}", echo("id")).unwrap();
        let response = handled(r.dispatch(&Request::new(Method::Post, "/register/42")));
        assert_eq!(body(&response), "42");
    }

    #[test]
    fn captured_segments_are_percent_decoded() {
        let mut r = router();
        r.get("/search/{term}", echo("term")).unwrap();
        let response = handled(r.dispatch(&get("/search/caf%C3%A9%20au%20lait")));
        assert_eq!(body(&response), "café au lait");
    }

    #[test]
    fn later_registration_wins_on_overlap() {
        let mut r = router();
        r.get("/items/{id}", text(StatusCode::Ok, "by-id")).unwrap();
        r.get("/{kind}/{id}", text(StatusCode::Ok, "by-kind")).unwrap();
        r.get("/items/featured", text(StatusCode::Ok, "featured")).unwrap();
        assert_eq!(r.len(), 3);

        assert_eq!(body(&handled(r.dispatch(&get("/items/featured")))), "featured");
        assert_eq!(body(&handled(r.dispatch(&get("/items/9")))), "by-kind");
        assert_eq!(body(&handled(r.dispatch(&get("/users/9")))), "by-kind");
    }

    #[test]
    fn same_pattern_under_another_name_replaces_the_route() {
        let mut r = router();
        r.get("/items/{id}", echo("id")).unwrap();
        r.get("/items/{slug}", echo("slug")).unwrap();
        assert_eq!(r.len(), 1);

        let response = handled(r.dispatch(&get("/items/9")));
        assert_eq!(body(&response), "9");
        assert_eq!(r.routes().next().unwrap().placeholders(), ["slug"]);
    }

    #[test]
    fn earlier_literal_is_shadowed_by_later_placeholder() {
        let mut r = router();
        r.get("/items/featured", text(StatusCode::Ok, "literal")).unwrap();
        r.get("/items/{id}", echo("id")).unwrap();
        assert_eq!(body(&handled(r.dispatch(&get("/items/featured")))), "featured");
    }

    #[test]
    fn literal_dot_does_not_match_any_char() {
        let mut r = router();
        r.get("/v1.0/status", text(StatusCode::Ok, "ok")).unwrap();
        assert!(r.dispatch(&get("/v1x0/status")).is_err());
        assert_eq!(body(&handled(r.dispatch(&get("/v1.0/status")))), "ok");
    }

    #[test]
    fn query_parameters_are_merged_and_path_wins() {
        let mut r = router();
        r.get(
            "/items/{id}",
            Handler::inline(|ctx| {
                let p = ctx.params();
                Response::new(StatusCode::Ok).body(format!(
                    "{}|{}",
                    p.get("id").unwrap_or(""),
                    p.get("sort").unwrap_or("")
                ))
            }),
        )
        .unwrap();
        let response = handled(r.dispatch(&get("/items/7?id=99&sort=asc")));
        assert_eq!(body(&response), "7|asc");
    }

    #[test]
    fn post_body_fields_are_merged() {
        let mut r = router();
        r.post("/register/{id}", echo("name")).unwrap();
        let request = Request::new(Method::Post, "/register/1")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .with_body("name=Ada&id=spoofed");
        assert_eq!(body(&handled(r.dispatch(&request))), "Ada");
    }

    #[test]
    fn multipart_post_fields_are_merged() {
        let mut r = router();
        r.post("/register/{id}", echo("name")).unwrap();
        let request = Request::new(Method::Post, "/register/1")
            .with_header("Content-Type", "multipart/form-data; boundary=----form")
            .with_body(
                "------form\r\n\
                 Content-Disposition: form-data; name=\"name\"\r\n\r\n\
                 Ada\r\n\
                 ------form--\r\n",
            );
        assert_eq!(body(&handled(r.dispatch(&request))), "Ada");
    }

    #[test]
    fn put_body_is_merged_only_after_the_gate() {
        let mut r = router();
        let seen_by_gate = Arc::new(Mutex::new(None));
        let probe = Arc::clone(&seen_by_gate);
        r.middlewares_mut().register_fn("probe", move |ctx: &mut Context<'_>| {
            *probe.lock().unwrap() = Some((ctx.has_deferred_body(), ctx.params().contains("qty")));
            true
        });
        r.put("/items/{id}", echo("qty")).unwrap().middleware("probe");

        let request = Request::new(Method::Put, "/items/3")
            .with_header("Content-Type", "application/json")
            .with_body(r#"{"qty": 5, "id": "other"}"#);
        let response = handled(r.dispatch(&request));

        assert_eq!(body(&response), "5");
        assert_eq!(*seen_by_gate.lock().unwrap(), Some((true, false)));
    }

    #[test]
    fn undecodable_body_is_ignored() {
        let mut r = router();
        r.patch("/items/{id}", echo("id")).unwrap();
        let request = Request::new(Method::Patch, "/items/3")
            .with_header("Content-Type", "application/json")
            .with_body("{broken");
        assert_eq!(body(&handled(r.dispatch(&request))), "3");
    }

    // ── Middleware ───────────────────────────────────────────────────────────

    #[test]
    fn rejecting_middleware_halts_without_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut r = router();
        r.middlewares_mut().register_fn("deny", |_: &mut Context<'_>| false);
        r.get(
            "/admin",
            Handler::inline(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Response::new(StatusCode::Ok)
            }),
        )
        .unwrap()
        .middleware("deny");

        let outcome = r.dispatch(&get("/admin")).unwrap();
        assert!(matches!(outcome, Dispatched::Halted(None)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn middleware_redirect_is_returned() {
        let mut r = router();
        r.get("/login", text(StatusCode::Ok, "login")).unwrap().name("web.login");
        r.middlewares_mut().register_fn("auth", |ctx: &mut Context<'_>| {
            let next = ctx.request().path().to_owned();
            ctx.redirect("web.login", [("next", next)]);
            false
        });
        r.get("/account", text(StatusCode::Ok, "account")).unwrap().middleware("auth");

        let Dispatched::Halted(Some(response)) = r.dispatch(&get("/account")).unwrap() else {
            panic!("expected a halted dispatch with a response");
        };
        assert_eq!(response.status(), StatusCode::Found);
        assert_eq!(response.location(), Some(&*format!("{BASE}/login?next=%2Faccount")));
    }

    // ── Groups ───────────────────────────────────────────────────────────────

    #[test]
    fn group_prefix_and_middlewares_are_applied() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut r = router();
        for id in ["group-gate", "route-gate"] {
            let order = Arc::clone(&order);
            r.middlewares_mut().register_fn(id, move |_: &mut Context<'_>| {
                order.lock().unwrap().push(id);
                true
            });
        }

        r.get("/", text(StatusCode::Ok, "home")).unwrap();
        {
            let mut ops = r.group("/ops/", &["group-gate"]);
            assert_eq!(ops.prefix(), "/ops");
            ops.get("/{errcode}", echo("errcode"))
                .unwrap()
                .name("web.error")
                .middleware("route-gate")
                .middleware("group-gate");
        }
        r.get("/after", text(StatusCode::Ok, "after")).unwrap();

        assert_eq!(body(&handled(r.dispatch(&get("/ops/404")))), "404");
        assert_eq!(*order.lock().unwrap(), vec!["group-gate", "route-gate"]);
        assert!(matches!(r.dispatch(&get("/404")), Err(RoutingError::NotFound { .. })));

        let after = r.routes().find(|route| route.template() == "/after").unwrap();
        assert!(after.middlewares().is_empty());
        assert_eq!(r.url_for("web.error", [("errcode", 404)]).unwrap(), format!("{BASE}/ops/404"));
    }

    #[test]
    fn group_root_route_is_the_prefix() {
        let mut r = router();
        r.group("/admin", &[]).get("/", text(StatusCode::Ok, "dash")).unwrap();
        assert_eq!(body(&handled(r.dispatch(&get("/admin")))), "dash");
        assert_eq!(body(&handled(r.dispatch(&get("/admin/")))), "dash");
    }

    // ── Controllers ──────────────────────────────────────────────────────────

    struct Web;

    impl Web {
        fn register(&self, data: &Parameters) -> Response {
            Response::new(StatusCode::Ok).body(format!("register:{}", data.get("id").unwrap_or("")))
        }
    }

    fn with_web(r: &mut Router) {
        r.namespace("app::controllers::")
            .controller(Controller::new("app::controllers::Web", |_: &Router| Web).action("register", Web::register));
    }

    #[test]
    fn controller_action_receives_parameters() {
        let mut r = router();
        with_web(&mut r);
        r.post("/register/{id}", "Web:register").unwrap();
        let response = handled(r.dispatch(&Request::new(Method::Post, "/register/42")));
        assert_eq!(body(&response), "register:42");
    }

    #[test]
    fn unknown_controller_is_bad_request() {
        let mut r = router();
        with_web(&mut r);
        r.get("/", "Home:index").unwrap();
        let err = r.dispatch(&get("/")).unwrap_err();
        assert_eq!(
            err,
            RoutingError::BadRequest {
                controller: "app::controllers::Home".to_owned()
            }
        );
        assert_eq!(err.status(), StatusCode::BadRequest);
    }

    #[test]
    fn unknown_action_is_method_not_allowed() {
        let mut r = router();
        with_web(&mut r);
        r.get("/", "Web:home").unwrap();
        let err = r.dispatch(&get("/")).unwrap_err();
        assert_eq!(err.status(), StatusCode::MethodNotAllowed);
    }

    // ── Reverse routing ──────────────────────────────────────────────────────

    #[test]
    fn url_for_round_trip_with_query() {
        let mut r = router();
        r.get("/items/{id}", "Items:show").unwrap().name("items.show");
        assert_eq!(r.url_for("items.show", [("id", 7)]).unwrap(), format!("{BASE}/items/7"));
        assert_eq!(
            r.url_for("items.show", [("id", "7"), ("ref", "home")]).unwrap(),
            format!("{BASE}/items/7?ref=home")
        );
        assert_eq!(r.url_for("nope", [("id", 7)]), None);
    }

    #[test]
    fn redirect_accepts_names_and_absolute_urls() {
        let mut r = router();
        r.get("/ops/{errcode}", "Web:error").unwrap().name("web.error");

        let response = r.redirect("web.error", [("errcode", 404)]).unwrap();
        assert_eq!(response.location(), Some(&*format!("{BASE}/ops/404")));

        let response = r.redirect("https://example.com/elsewhere", [("a", "b")]).unwrap();
        assert_eq!(response.location(), Some("https://example.com/elsewhere"));

        assert!(r.redirect("no.such.route", [("a", "b")]).is_none());
    }

    // ── respond ──────────────────────────────────────────────────────────────

    #[test]
    fn respond_redirects_errors_to_the_error_route() {
        let mut r = router();
        r.error_route("web.error");
        r.get("/", text(StatusCode::Ok, "home")).unwrap();
        r.group("/ops", &[]).get("/{errcode}", echo("errcode")).unwrap().name("web.error");

        let response = r.respond(&get("/nope"));
        assert_eq!(response.status(), StatusCode::Found);
        assert_eq!(response.location(), Some(&*format!("{BASE}/ops/404")));

        let response = r.respond(&Request::new(Method::Post, "/"));
        assert_eq!(response.location(), Some(&*format!("{BASE}/ops/501")));
    }

    #[test]
    fn respond_without_error_route_uses_status() {
        let mut r = router();
        r.get("/", text(StatusCode::Ok, "home")).unwrap();
        r.middlewares_mut().register_fn("deny", |_: &mut Context<'_>| false);
        r.get("/private", text(StatusCode::Ok, "secret")).unwrap().middleware("deny");

        assert_eq!(r.respond(&get("/")).status(), StatusCode::Ok);
        assert_eq!(r.respond(&get("/nope")).status(), StatusCode::NotFound);
        assert_eq!(r.respond(&get("/private")).status(), StatusCode::Forbidden);
    }

    #[test]
    fn from_config_applies_namespace_and_error_route() {
        let config = RouterConfig::from_json(
            r#"{"base_url": "http://localhost:8040", "namespace": "app::controllers", "error_route": "web.error"}"#,
        )
        .unwrap();
        let mut r = Router::from_config(config).unwrap();
        r.controller(Controller::new("app::controllers::Web", |_: &Router| Web).action("register", Web::register));
        r.get("/r/{id}", "Web:register").unwrap();
        r.get("/ops/{errcode}", echo("errcode")).unwrap().name("web.error");

        assert_eq!(body(&r.respond(&get("/r/5"))), "register:5");
        assert_eq!(
            r.respond(&get("/x/y")).location(),
            Some("http://localhost:8040/ops/404")
        );
    }
}
