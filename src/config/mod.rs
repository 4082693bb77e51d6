//! Router configuration loaded from JSON.

use serde::Deserialize;

use crate::router::RouterError;

/// Settings a [`Router`](crate::Router) can be built from.
///
/// # Examples
///
/// ```
/// use signpost::Router;
/// use signpost::config::RouterConfig;
///
/// let config = RouterConfig::from_json(r#"{
///     "base_url": "http://localhost:8040/router/examples",
///     "namespace": "app::controllers",
///     "error_route": "web.error"
/// }"#).unwrap();
///
/// let router = Router::from_config(config).unwrap();
/// assert_eq!(router.base_url(), "http://localhost:8040/router/examples");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterConfig {
    /// Absolute URL every generated link starts with.
    pub base_url: String,
    /// Namespace `"Controller:action"` handlers are qualified with.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Route name routing errors redirect to.
    #[serde(default)]
    pub error_route: Option<String>,
}

impl RouterConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            namespace: None,
            error_route: None,
        }
    }

    /// Decode a config from a JSON document.
    ///
    /// # Errors
    ///
    /// [`RouterError::Config`] when the document is not valid JSON, lacks
    /// `base_url`, or carries unknown keys. The URL itself is only checked
    /// by [`Router::from_config`](crate::Router::from_config).
    pub fn from_json(source: &str) -> Result<Self, RouterError> {
        Ok(serde_json::from_str(source)?)
    }
}
