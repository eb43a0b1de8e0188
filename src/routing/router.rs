use super::trie::TrieRouter;
use crate::error::{Error, Result};
use crate::metadata::{ActionType, RoutePattern};
use regex::Regex;
use std::collections::HashMap;

/// A matched route: the action index plus extracted path parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub action: usize,
    pub params: HashMap<String, String>,
}

struct RegexRoute {
    action_type: ActionType,
    regex: Regex,
    action: usize,
}

/// Maps `(method, path)` to an action index
///
/// Literal routes live in a [`TrieRouter`]. Regular-expression routes are
/// tried afterwards, in registration order; their named capture groups
/// become path parameters.
#[derive(Default)]
pub struct Router {
    trie: TrieRouter,
    regex_routes: Vec<RegexRoute>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action route
    ///
    /// Two literal routes with the same method and path shape would make
    /// dispatch ambiguous and are rejected.
    pub fn add_route(&mut self, action_type: ActionType, pattern: &RoutePattern, action: usize) -> Result<()> {
        match pattern {
            RoutePattern::Path(path) => {
                if let Some(previous) = self.trie.add_route(action_type.as_method(), path, action) {
                    return Err(Error::config(format!(
                        "Route {} {} is declared by two actions (#{} and #{})",
                        action_type, path, previous.action, action
                    )));
                }
            }
            RoutePattern::Regex(regex) => self.regex_routes.push(RegexRoute {
                action_type,
                regex: regex.clone(),
                action,
            }),
        }
        Ok(())
    }

    pub fn match_route(&self, method: &str, path: &str) -> Option<RouteMatch> {
        if let Some((route, params)) = self.trie.match_route(method, path) {
            return Some(RouteMatch {
                action: route.action,
                params,
            });
        }

        let path_only = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
        self.regex_routes
            .iter()
            .filter(|route| route.action_type.matches(method))
            .find_map(|route| {
                let captures = route.regex.captures(path_only)?;
                let params = route
                    .regex
                    .capture_names()
                    .flatten()
                    .filter_map(|name| Some((name.to_string(), captures.name(name)?.as_str().to_string())))
                    .collect();
                Some(RouteMatch {
                    action: route.action,
                    params,
                })
            })
    }

    pub fn route_count(&self) -> usize {
        self.trie.route_count() + self.regex_routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.route_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_before_regex() {
        let mut router = Router::new();
        router
            .add_route(ActionType::Get, &RoutePattern::from("/photos/:id"), 0)
            .unwrap();
        router
            .add_route(
                ActionType::Get,
                &RoutePattern::Regex(Regex::new(r"^/photos/(?P<id>\d+)/raw$").unwrap()),
                1,
            )
            .unwrap();

        let matched = router.match_route("GET", "/photos/3").unwrap();
        assert_eq!(matched.action, 0);

        let matched = router.match_route("GET", "/photos/3/raw").unwrap();
        assert_eq!(matched.action, 1);
        assert_eq!(matched.params.get("id"), Some(&"3".to_string()));
        assert!(router.match_route("POST", "/photos/3/raw").is_none());
        assert_eq!(router.route_count(), 2);
    }

    #[test]
    fn test_duplicate_routes_rejected() {
        let mut router = Router::new();
        router
            .add_route(ActionType::Get, &RoutePattern::from("/users/:id"), 0)
            .unwrap();
        let err = router
            .add_route(ActionType::Get, &RoutePattern::from("/users/{name}"), 1)
            .unwrap_err();
        assert!(err.to_string().contains("GET /users/{name}"));

        router
            .add_route(ActionType::Delete, &RoutePattern::from("/users/:id"), 2)
            .unwrap();
    }
}
