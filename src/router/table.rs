//! Verb-partitioned route storage.

use super::route::Route;
use crate::Method;

/// Routes grouped by verb, each group in registration order.
///
/// Verbs keep the order in which their first route was registered, which is
/// also the order reverse lookups search them in.
#[derive(Debug, Default)]
pub struct RouteTable {
    verbs: Vec<(Method, Vec<Route>)>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `route`, replacing in place any route of the same verb whose
    /// compiled pattern is identical. Returns the stored route.
    pub fn insert(&mut self, route: Route) -> &mut Route {
        let index = match self.verbs.iter().position(|(m, _)| *m == route.method) {
            Some(index) => index,
            None => {
                self.verbs.push((route.method.clone(), Vec::new()));
                self.verbs.len() - 1
            }
        };
        let routes = &mut self.verbs[index].1;

        let slot = match routes
            .iter()
            .position(|r| r.pattern.as_str() == route.pattern.as_str())
        {
            Some(slot) => {
                routes[slot] = route;
                slot
            }
            None => {
                routes.push(route);
                routes.len() - 1
            }
        };
        &mut routes[slot]
    }

    /// Routes registered for `method`, in registration order.
    pub fn routes_for(&self, method: &Method) -> &[Route] {
        self.verbs
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, routes)| routes.as_slice())
            .unwrap_or(&[])
    }

    /// The last route of `method` whose pattern matches `path`, with its captures.
    pub fn find_match<'t, 'p>(
        &'t self,
        method: &Method,
        path: &'p str,
    ) -> Option<(&'t Route, Vec<&'p str>)> {
        self.routes_for(method)
            .iter()
            .rev()
            .find_map(|route| route.pattern.captures(path).map(|caps| (route, caps)))
    }

    /// First route carrying `name`, searching verbs in first-registration order.
    pub fn find_named(&self, name: &str) -> Option<&Route> {
        self.iter().find(|route| route.name() == Some(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.verbs.iter().flat_map(|(_, routes)| routes.iter())
    }

    pub fn len(&self) -> usize {
        self.verbs.iter().map(|(_, routes)| routes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
