//! Method and path based request classification.
//!
//! The proxy owns a small, fixed set of control-plane paths. Everything else
//! is forwarded. Routes are kept in an explicit ordered list and the first
//! match wins, so a literal route placed before a templated route of the same
//! shape takes precedence over it.

use http::Method;

/// Handler of a locally answered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalRoute {
    /// `GET /`.
    ClusterInfo,
    /// Node stats.
    NodeStats,
    /// The literal `/_all/_stats/_all` route.
    AllIndexStats,
    /// `/{index}/_stats/{metrics}`.
    IndexStats,
    /// Cluster health.
    Health,
    /// `POST /{index}/_refresh`.
    Refresh,
    /// `POST /{index}/_forcemerge`.
    ForceMerge,
}

/// One segment of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the path segment exactly.
    Literal(&'static str),
    /// Matches any single non-empty segment and captures it under this name.
    Param(&'static str),
}

/// A parsed path pattern such as `/{index}/_stats/{metrics}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern. `{name}` segments are parameters, anything else is literal.
    ///
    /// # Examples
    ///
    /// ```
    /// use sigproxy_http::router::PathPattern;
    ///
    /// let pattern = PathPattern::parse("/{index}/_refresh");
    /// let params = pattern.matches("/movies/_refresh").unwrap();
    /// assert_eq!(params.get("index"), Some("movies"));
    /// assert!(pattern.matches("/movies/_refresh/").is_none());
    /// ```
    #[must_use]
    pub fn parse(pattern: &'static str) -> Self {
        let segments = split_path(pattern)
            .into_iter()
            .map(|seg| {
                seg.strip_prefix('{')
                    .and_then(|s| s.strip_suffix('}'))
                    .map_or(Segment::Literal(seg), Segment::Param)
            })
            .collect();
        Self { segments }
    }

    /// Match `path` against this pattern, returning captured parameters.
    #[must_use]
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts = split_path(path);
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::default();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(lit) if *lit == part => {}
                Segment::Param(name) if !part.is_empty() => {
                    params.0.push((name, part.to_owned()));
                }
                _ => return None,
            }
        }
        Some(params)
    }
}

/// Parameters captured by a path pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(&'static str, String)>);

impl PathParams {
    /// Value of the named parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A single `(method, pattern) -> handler` rule.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    pattern: PathPattern,
    handler: LocalRoute,
}

impl Route {
    /// Create a rule.
    #[must_use]
    pub fn new(method: Method, pattern: &'static str, handler: LocalRoute) -> Self {
        Self {
            method,
            pattern: PathPattern::parse(pattern),
            handler,
        }
    }
}

/// Outcome of classifying a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Answer locally.
    Local {
        /// Handler to run.
        route: LocalRoute,
        /// Captured path parameters.
        params: PathParams,
    },
    /// The path is locally owned but not for this method.
    NotFound,
    /// Sign and forward upstream.
    Forward,
}

/// Ordered, first-match-wins route list.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::default_routes()
    }
}

impl RouteTable {
    /// Create a table from rules in priority order.
    #[must_use]
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The emulated control-plane surface.
    ///
    /// `/_all/_stats/_all` must stay ahead of `/{index}/_stats/{metrics}`.
    #[must_use]
    pub fn default_routes() -> Self {
        use LocalRoute::{
            AllIndexStats, ClusterInfo, ForceMerge, Health, IndexStats, NodeStats, Refresh,
        };

        Self::new(vec![
            Route::new(Method::GET, "/", ClusterInfo),
            Route::new(Method::GET, "/_stats/{metrics}", NodeStats),
            Route::new(Method::GET, "/_nodes/stats", NodeStats),
            Route::new(Method::GET, "/_nodes/stats/{metrics}", NodeStats),
            Route::new(Method::GET, "/_all/_stats/_all", AllIndexStats),
            Route::new(Method::GET, "/{index}/_stats/{metrics}", IndexStats),
            Route::new(Method::GET, "/_nodes/{node_id}", NodeStats),
            Route::new(Method::GET, "/_cluster/health", Health),
            Route::new(Method::GET, "/_cluster/health/{index}", Health),
            Route::new(Method::POST, "/{index}/_refresh", Refresh),
            Route::new(Method::POST, "/{index}/_forcemerge", ForceMerge),
        ])
    }

    /// Classify a request by method and path. The query string is not consulted.
    #[must_use]
    pub fn dispatch(&self, method: &Method, path: &str) -> Dispatch {
        let mut path_owned = false;
        for route in &self.routes {
            let Some(params) = route.pattern.matches(path) else {
                continue;
            };
            if route.method == *method {
                return Dispatch::Local {
                    route: route.handler,
                    params,
                };
            }
            path_owned = true;
        }

        if path_owned {
            Dispatch::NotFound
        } else {
            Dispatch::Forward
        }
    }
}

/// Split a path into segments. `/` has no segments.
fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}
