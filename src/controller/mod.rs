//! Controllers — named handler types whose actions routes refer to as
//! `"Controller:action"`.
//!
//! A controller is registered once with a constructor and a table of actions.
//! At dispatch time the router looks the controller up by its fully-qualified
//! identifier (`namespace::Name`), builds a fresh instance from the router,
//! and invokes the action with the route's [`Parameters`].
//!
//! | Lookup outcome                    | Dispatch result      |
//! |-----------------------------------|----------------------|
//! | identifier not registered         | `400 Bad Request`    |
//! | registered, action missing        | `405 Method Not Allowed` |
//! | registered, action present        | handler response     |

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::Response;
use crate::context::Parameters;
use crate::router::Router;

type Construct<C> = Box<dyn Fn(&Router) -> C + Send + Sync + 'static>;
type Action<C> = Box<dyn Fn(&C, &Parameters) -> Response + Send + Sync + 'static>;

/// Definition of a controller type `C`: how to build it and which actions it exposes.
///
/// # Examples
///
/// ```
/// use signpost::controller::Controller;
/// use signpost::context::Parameters;
/// use signpost::{Response, Router, StatusCode};
///
/// struct Web {
///     register_url: String,
/// }
///
/// impl Web {
///     fn new(router: &Router) -> Self {
///         Self { register_url: router.url("web.register").unwrap_or_default() }
///     }
///
///     fn home(&self, _data: &Parameters) -> Response {
///         Response::new(StatusCode::Ok).body(format!("<a href='{}'>Cadastro</a>", self.register_url))
///     }
/// }
///
/// let web = Controller::new("app::controllers::Web", Web::new).action("home", Web::home);
/// assert!(web.has_action("home"));
/// assert_eq!(web.id(), "app::controllers::Web");
/// ```
pub struct Controller<C> {
    id: String,
    construct: Construct<C>,
    actions: HashMap<String, Action<C>>,
}

impl<C: 'static> Controller<C> {
    /// Start a definition for the controller identified by `id`.
    ///
    /// `construct` receives the router that is dispatching, mirroring a
    /// constructor that takes the router instance.
    pub fn new<F>(id: impl Into<String>, construct: F) -> Self
    where
        F: Fn(&Router) -> C + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            construct: Box::new(construct),
            actions: HashMap::new(),
        }
    }

    /// Expose `action` under `name`. Re-using a name replaces the earlier action.
    #[must_use]
    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&C, &Parameters) -> Response + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Box::new(action));
        self
    }
}

impl<C> Controller<C> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }
}

/// Type-erased view of a registered [`Controller`].
pub trait AnyController: Send + Sync {
    fn has_action(&self, action: &str) -> bool;

    /// Build a fresh controller and run `action`. Returns `None` if the action
    /// does not exist.
    fn invoke(&self, router: &Router, action: &str, params: &Parameters) -> Option<Response>;
}

impl<C: 'static> AnyController for Controller<C> {
    fn has_action(&self, action: &str) -> bool {
        self.actions.contains_key(action)
    }

    fn invoke(&self, router: &Router, action: &str, params: &Parameters) -> Option<Response> {
        let action = self.actions.get(action)?;
        let controller = (self.construct)(router);
        Some(action(&controller, params))
    }
}

/// Fully-qualified identifier → controller table.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Box<dyn AnyController>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `controller` under its identifier, replacing any earlier one.
    pub fn register<C: 'static>(&mut self, controller: Controller<C>) {
        debug!(
            controller = %controller.id,
            actions = controller.actions.len(),
            "controller registered"
        );
        self.controllers
            .insert(controller.id.clone(), Box::new(controller));
    }

    pub fn resolve(&self, id: &str) -> Option<&dyn AnyController> {
        self.controllers.get(id).map(|c| c.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.controllers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.controllers.keys().collect();
        ids.sort();
        f.debug_struct("ControllerRegistry").field("ids", &ids).finish()
    }
}

/// Join a namespace and a controller name into a registry identifier.
///
/// An empty namespace leaves the name untouched.
///
/// # Examples
///
/// ```
/// use signpost::controller::qualify;
///
/// assert_eq!(qualify("app::controllers", "Web"), "app::controllers::Web");
/// assert_eq!(qualify("app::controllers::", "Web"), "app::controllers::Web");
/// assert_eq!(qualify("", "Web"), "Web");
/// ```
pub fn qualify(namespace: &str, controller: &str) -> String {
    let namespace = namespace.trim_end_matches("::");
    if namespace.is_empty() {
        controller.to_owned()
    } else {
        format!("{namespace}::{controller}")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::StatusCode;

    struct Counter {
        base: String,
    }

    #[test]
    fn invoke_builds_a_fresh_instance_per_call() {
        let built = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&built);
        let controller = Controller::new("Counter", move |router: &Router| {
            seen.fetch_add(1, Ordering::SeqCst);
            Counter {
                base: router.base_url().to_owned(),
            }
        })
        .action("show", |c: &Counter, p: &Parameters| {
            Response::new(StatusCode::Ok).body(format!("{}#{}", c.base, p.get("id").unwrap_or("")))
        });

        let router = Router::new("http://localhost:8040").unwrap();
        let params: Parameters = [("id", "9")].into_iter().collect();

        let response = controller.invoke(&router, "show", &params).unwrap();
        assert_eq!(response.content(), b"http://localhost:8040#9");
        controller.invoke(&router, "show", &params).unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_action_is_not_invoked() {
        let controller = Controller::new("Web", |_: &Router| ());
        let router = Router::new("http://localhost").unwrap();
        assert!(!AnyController::has_action(&controller, "home"));
        assert!(controller.invoke(&router, "home", &Parameters::new()).is_none());
    }

    #[test]
    fn registry_resolves_by_full_identifier() {
        let mut registry = ControllerRegistry::new();
        registry.register(
            Controller::new("app::Web", |_: &Router| ())
                .action("home", |_: &(), _: &Parameters| Response::new(StatusCode::Ok)),
        );
        assert!(registry.contains("app::Web"));
        assert!(registry.resolve("Web").is_none());
        assert!(registry.resolve("app::Web").unwrap().has_action("home"));
        assert_eq!(registry.len(), 1);
    }
}
