//! Per-dispatch state — the matched route, its merged parameters, and the
//! deferred body that PUT/PATCH/DELETE requests carry.
//!
//! A [`Context`] is built by [`Router::dispatch`](crate::Router::dispatch) once a
//! route has matched, handed mutably to each middleware gate, and finally to the
//! handler. It never outlives the dispatch call.

use std::collections::HashMap;

use tracing::warn;

use crate::Request;
use crate::Response;
use crate::router::{Route, Router};

/// Named request parameters: path placeholders merged with query and body fields.
///
/// # Examples
///
/// ```
/// use signpost::context::Parameters;
///
/// let mut params = Parameters::new();
/// params.insert("id", "42");
/// assert_eq!(params.get("id"), Some("42"));
/// assert_eq!(params.get("missing"), None);
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value for `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> Extend<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        params.extend(iter);
        params
    }
}

/// State for one dispatch of one request against one matched route.
pub struct Context<'r> {
    router: &'r Router,
    request: &'r Request,
    route: &'r Route,
    params: Parameters,
    // Set for PUT/PATCH/DELETE until the body has been merged into `params`.
    deferred_body: bool,
    response: Option<Response>,
}

impl<'r> Context<'r> {
    pub(crate) fn new(
        router: &'r Router,
        request: &'r Request,
        route: &'r Route,
        params: Parameters,
    ) -> Self {
        Self {
            router,
            request,
            route,
            params,
            deferred_body: request.method().has_deferred_body(),
            response: None,
        }
    }

    /// The router that matched this request, for reverse lookups.
    pub fn router(&self) -> &'r Router {
        self.router
    }

    pub fn request(&self) -> &'r Request {
        self.request
    }

    /// The route that matched.
    pub fn route(&self) -> &'r Route {
        self.route
    }

    /// Parameters merged so far. For PUT/PATCH/DELETE the body fields only
    /// appear once the gate has passed.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    /// Returns `true` while a PUT/PATCH/DELETE body is still waiting to be merged.
    pub fn has_deferred_body(&self) -> bool {
        self.deferred_body
    }

    /// Attach the response a rejecting middleware wants sent instead of the handler's.
    pub fn respond(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Attach a redirect to a named route (or an absolute URL).
    ///
    /// Returns `false` and leaves the context untouched when `target` resolves
    /// to neither.
    pub fn redirect<I, K, V>(&mut self, target: &str, data: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: ToString,
    {
        match self.router.redirect(target, data) {
            Some(response) => {
                self.response = Some(response);
                true
            }
            None => false,
        }
    }

    /// Deserialize the request body as JSON.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }

    pub(crate) fn take_response(&mut self) -> Option<Response> {
        self.response.take()
    }

    /// Merge the deferred body into the parameters. Path placeholders keep
    /// their captured values; body fields override query fields.
    pub(crate) fn resolve_deferred_body(&mut self) {
        if !self.deferred_body {
            return;
        }
        self.deferred_body = false;

        match self.request.body_fields() {
            Ok(fields) => {
                let placeholders = self.route.placeholders();
                for (key, value) in fields {
                    if !placeholders.iter().any(|name| *name == key) {
                        self.params.insert(key, value);
                    }
                }
            }
            Err(e) => {
                warn!(
                    method = %self.request.method(),
                    path = %self.request.path(),
                    error = %e,
                    "ignoring undecodable request body"
                );
            }
        }
    }
}
