//! Middleware gates — ordered pass/fail checks that run before a route's handler.
//!
//! Routes refer to middleware by identifier. Identifiers are resolved at
//! dispatch time against a [`MiddlewareRegistry`] of zero-argument
//! constructors, so a route may name middleware that is registered later, or
//! never (unknown identifiers are skipped).
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all gates.
//! - [`MiddlewareRegistry`] — identifier → constructor table and the gate runner.
//! - [`RequestLogger`] — built-in gate that logs the match and always passes.
//!
//! ## Gate semantics
//!
//! | Chain                  | Result                                     |
//! |------------------------|--------------------------------------------|
//! | empty                  | pass                                       |
//! | every gate passes      | pass                                       |
//! | a gate returns `false` | reject; later gates and the handler do not run |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::Context;

/// The core trait for all middleware.
///
/// `handle` receives the dispatch [`Context`] with the route's parameters.
/// Returning `false` stops dispatch. A rejecting middleware that wants the
/// client to see something (typically a redirect) attaches it with
/// [`Context::respond`] or [`Context::redirect`]; the router itself records
/// no error for a rejection.
///
/// Closures of the shape `Fn(&mut Context<'_>) -> bool` implement this trait.
///
/// # Examples
///
/// ```rust
/// use signpost::context::Context;
/// use signpost::middleware::Middleware;
///
/// #[derive(Default)]
/// struct Guest;
///
/// impl Middleware for Guest {
///     fn handle(&self, ctx: &mut Context<'_>) -> bool {
///         if ctx.request().headers().contains("authorization") {
///             ctx.redirect("web.home", [("from", "guest")]);
///             return false;
///         }
///         true
///     }
/// }
/// ```
pub trait Middleware {
    /// Decide whether dispatch may continue.
    fn handle(&self, ctx: &mut Context<'_>) -> bool;
}

impl<F> Middleware for F
where
    F: Fn(&mut Context<'_>) -> bool,
{
    fn handle(&self, ctx: &mut Context<'_>) -> bool {
        (self)(ctx)
    }
}

/// Zero-argument middleware constructor.
pub type Constructor = Arc<dyn Fn() -> Box<dyn Middleware> + Send + Sync + 'static>;

/// Identifier → constructor table.
///
/// A fresh middleware value is constructed for every gate run.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    constructors: HashMap<String, Constructor>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M` under `id`, constructed with [`Default`].
    pub fn register<M>(&mut self, id: impl Into<String>)
    where
        M: Middleware + Default + 'static,
    {
        self.register_with(id, M::default);
    }

    /// Register `id` with an explicit constructor.
    pub fn register_with<M, F>(&mut self, id: impl Into<String>, construct: F)
    where
        M: Middleware + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        let id = id.into();
        debug!(middleware = %id, "middleware registered");
        self.constructors
            .insert(id, Arc::new(move || Box::new(construct()) as Box<dyn Middleware>));
    }

    /// Register a closure gate under `id`.
    pub fn register_fn<F>(&mut self, id: impl Into<String>, gate: F)
    where
        F: Fn(&mut Context<'_>) -> bool + Clone + Send + Sync + 'static,
    {
        self.register_with(id, move || gate.clone());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Run the gates named by `ids`, in order, against `ctx`.
    ///
    /// Returns `true` when `ids` is empty or every resolvable gate passes.
    /// Unknown identifiers are skipped. The first gate returning `false`
    /// short-circuits the chain.
    pub fn run_gate(&self, ids: &[String], ctx: &mut Context<'_>) -> bool {
        for id in ids {
            let Some(construct) = self.constructors.get(id) else {
                warn!(middleware = %id, "unknown middleware skipped");
                continue;
            };

            let middleware = construct();
            if !middleware.handle(ctx) {
                debug!(
                    middleware = %id,
                    path = %ctx.request().path(),
                    "request rejected by middleware"
                );
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.constructors.keys().collect();
        ids.sort();
        f.debug_struct("MiddlewareRegistry").field("ids", &ids).finish()
    }
}

/// Built-in middleware that logs each matched request and always passes.
///
/// Emits a single `tracing::info!` record with the method, path, route
/// template, route name, and the number of parameters extracted so far.
///
/// # Examples
///
/// ```rust
/// use signpost::Router;
/// use signpost::middleware::RequestLogger;
///
/// let mut router = Router::new("http://localhost").unwrap();
/// router.middleware::<RequestLogger>("log");
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn handle(&self, ctx: &mut Context<'_>) -> bool {
        let route = ctx.route();
        info!(
            method = %ctx.request().method(),
            path = %ctx.request().path(),
            route = %route.template(),
            name = route.name().unwrap_or("-"),
            params = ctx.params().len(),
            "route matched"
        );
        true
    }
}
