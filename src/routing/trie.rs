//! Trie-based path matcher for literal action routes
//!
//! Routes are compiled into a segment trie at startup. Static segments are
//! tried before parameters and parameters before wildcards, so the most
//! specific declared route wins regardless of registration order.

use std::collections::HashMap;

/// Route entry stored at a trie node for one method
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteInfo {
    /// Index of the action in the driver's action table
    pub action: usize,
    /// Parameter names in path order
    pub param_names: Vec<String>,
}

#[derive(Debug, Default)]
struct TrieNode {
    /// Exact path segment match
    static_children: HashMap<String, TrieNode>,
    /// Dynamic parameter match (`:id` or `{id}`)
    param_child: Option<Box<TrieNode>>,
    /// Wildcard match, consumes the rest of the path
    wildcard_child: Option<Box<TrieNode>>,
    /// Route for each HTTP method at this node, `*` for any method
    handlers: HashMap<String, RouteInfo>,
}

impl TrieNode {
    fn route_for(&self, method: &str) -> Option<&RouteInfo> {
        self.handlers.get(method).or_else(|| self.handlers.get("*"))
    }
}

#[derive(Default)]
pub struct TrieRouter {
    root: TrieNode,
    route_count: usize,
}

impl TrieRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route to the trie
    ///
    /// Returns the previously registered route for the same method and path
    /// shape, if any. The new route replaces it.
    pub fn add_route(&mut self, method: &str, path: &str, action: usize) -> Option<RouteInfo> {
        let mut current = &mut self.root;
        let mut param_names = Vec::new();

        for segment in parse_path(path) {
            current = match segment {
                PathSegment::Static(segment) => current.static_children.entry(segment).or_default(),
                PathSegment::Parameter(name) => {
                    param_names.push(name);
                    &mut **current.param_child.get_or_insert_with(Default::default)
                }
                PathSegment::Wildcard => &mut **current.wildcard_child.get_or_insert_with(Default::default),
            };
        }

        let previous = current.handlers.insert(
            method.to_uppercase(),
            RouteInfo {
                action,
                param_names,
            },
        );
        if previous.is_none() {
            self.route_count += 1;
        }
        previous
    }

    /// Match a route in the trie
    ///
    /// Returns the route and the extracted path parameters.
    pub fn match_route(&self, method: &str, path: &str) -> Option<(&RouteInfo, HashMap<String, String>)> {
        let path_only = path.split_once('?').map(|(p, _)| p).unwrap_or(path);

        let segments: Vec<&str> = path_only.split('/').filter(|s| !s.is_empty()).collect();

        let method = method.to_uppercase();
        let mut values = Vec::new();
        let route = match_segments(&self.root, &segments, &method, &mut values)?;

        let params = route
            .param_names
            .iter()
            .cloned()
            .zip(values.into_iter().map(decode_segment))
            .collect();
        Some((route, params))
    }

    pub fn route_count(&self) -> usize {
        self.route_count
    }
}

fn parse_path(path: &str) -> Vec<PathSegment> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            if segment == "*" {
                PathSegment::Wildcard
            } else if let Some(name) = segment.strip_prefix(':') {
                PathSegment::Parameter(name.to_string())
            } else if segment.starts_with('{') && segment.ends_with('}') {
                PathSegment::Parameter(segment[1..segment.len() - 1].to_string())
            } else {
                PathSegment::Static(segment.to_string())
            }
        })
        .collect()
}

/// Recursively match segments, backtracking when a branch has no route for the method
fn match_segments<'n, 's>(
    node: &'n TrieNode,
    segments: &[&'s str],
    method: &str,
    values: &mut Vec<&'s str>,
) -> Option<&'n RouteInfo> {
    let Some((current, rest)) = segments.split_first() else {
        return node.route_for(method);
    };

    if let Some(child) = node.static_children.get(*current) {
        if let Some(route) = match_segments(child, rest, method, values) {
            return Some(route);
        }
    }

    if let Some(child) = &node.param_child {
        values.push(*current);
        if let Some(route) = match_segments(child, rest, method, values) {
            return Some(route);
        }
        values.pop();
    }

    node.wildcard_child
        .as_ref()
        .and_then(|child| child.route_for(method))
}

fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[derive(Debug, Clone)]
enum PathSegment {
    Static(String),
    Parameter(String),
    Wildcard,
}
