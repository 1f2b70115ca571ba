//! # Route Resolver
//!
//! Turns a raw routable identifier (usually a deep-link URI) into a [`Route`].
//!
//! The addressing scheme is small on purpose:
//!
//! ```text
//! <scheme>://<host><prefix>/route/<name>[?k=v&...]            -> feature route
//! <scheme>://<host><prefix>/navigation/key/<name>[?k=v&...]   -> navigation route
//! <scheme>://<host><prefix>/<name>[?k=v&...]                  -> feature route (fallback)
//! ```
//!
//! Resolution never fails with an error: anything that does not fit yields a
//! route whose status is [`RouteStatus::Failed`] with the reason attached.

use http::Uri;
use tracing::{debug, warn};

const ROUTE_SEGMENT: &str = "route";
const NAVIGATION_SEGMENT: &str = "navigation";
const KEY_SEGMENT: &str = "key";

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteStatus {
    Success,
    /// Carries a human-readable diagnostic.
    Failed(String),
}

/// Structured form of a routable identifier.
///
/// On success exactly one of `route_name` / `navigation_key` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub route_name: Option<String>,
    pub navigation_key: Option<String>,
    /// Query parameters flattened to `key=value`, in order of appearance.
    pub params: Vec<String>,
    pub status: RouteStatus,
}

impl Route {
    fn failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            route_name: None,
            navigation_key: None,
            params: Vec::new(),
            status: RouteStatus::Failed(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RouteStatus::Success
    }

    /// The feature this route addresses: the route name, else the navigation key.
    pub fn feature_id(&self) -> Option<&str> {
        if !self.is_success() {
            return None;
        }
        self.route_name
            .as_deref()
            .or(self.navigation_key.as_deref())
    }

    /// Diagnostic for a failed route.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.status {
            RouteStatus::Failed(reason) => Some(reason),
            RouteStatus::Success => None,
        }
    }
}

/// Parses raw identifiers against a fixed path prefix.
#[derive(Debug, Clone)]
pub struct RouteResolver {
    prefix: Vec<String>,
}

impl RouteResolver {
    pub fn new(path_prefix: &str) -> Self {
        Self {
            prefix: path_prefix
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn resolve(&self, raw: &str) -> Route {
        let route = self.parse(raw);
        match &route.status {
            RouteStatus::Success => debug!(raw, feature_id = ?route.feature_id(), ?route.params, "Resolved"),
            RouteStatus::Failed(reason) => warn!(raw, %reason, "Resolution failed"),
        }
        route
    }

    fn parse(&self, raw: &str) -> Route {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Route::failed("", "Identifier is blank");
        }

        let uri: Uri = match trimmed.parse() {
            Ok(uri) => uri,
            Err(e) => return Route::failed(trimmed, format!("Unparseable identifier: {e}")),
        };

        let path = uri.path().to_string();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let has_prefix = segments.len() >= self.prefix.len()
            && segments.iter().zip(&self.prefix).all(|(segment, expected)| segment == expected);
        if !has_prefix {
            return Route::failed(path, format!("Missing required prefix /{}", self.prefix.join("/")));
        }

        let params = parse_query(uri.query());

        // Owned results only, so `path` is free to move afterwards.
        let resolved: Result<(Option<String>, Option<String>), String> = match &segments[self.prefix.len()..] {
            [ROUTE_SEGMENT, name] => Ok((Some(name.to_string()), None)),
            [NAVIGATION_SEGMENT, KEY_SEGMENT, key] => Ok((None, Some(key.to_string()))),
            [name] if *name != ROUTE_SEGMENT && *name != NAVIGATION_SEGMENT => Ok((Some(name.to_string()), None)),
            [] => Err("No route after prefix".to_string()),
            rest => Err(format!("Unrecognised route form: {}", rest.join("/"))),
        };
        drop(segments);

        let (route_name, navigation_key) = match resolved {
            Ok(names) => names,
            Err(reason) => return Route::failed(path, reason),
        };

        Route {
            path,
            route_name,
            navigation_key,
            params,
            status: RouteStatus::Success,
        }
    }
}

/// Flattens a query string to `key=value` entries. Pairs with an empty key or
/// undecodable text are dropped on their own.
fn parse_query(query: Option<&str>) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };

    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decoded = urlencoding::decode(key)
                .and_then(|k| urlencoding::decode(value).map(|v| (k, v)));
            match decoded {
                Ok((k, _)) if k.is_empty() => {
                    debug!(pair, "Dropping parameter without key");
                    None
                }
                Ok((k, v)) => Some(format!("{k}={v}")),
                Err(e) => {
                    debug!(pair, error = %e, "Dropping undecodable parameter");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> RouteResolver {
        RouteResolver::new("/chase/df")
    }

    #[test]
    fn test_feature_route() {
        let route = resolver().resolve("scheme://host/chase/df/route/plants");
        assert!(route.is_success());
        assert_eq!(route.route_name.as_deref(), Some("plants"));
        assert_eq!(route.navigation_key, None);
        assert_eq!(route.feature_id(), Some("plants"));
        assert!(route.params.is_empty());
    }

    #[test]
    fn test_navigation_route_with_params() {
        let route = resolver().resolve("scheme://host/chase/df/navigation/key/settings?tab=privacy&mode=dark");
        assert!(route.is_success());
        assert_eq!(route.route_name, None);
        assert_eq!(route.navigation_key.as_deref(), Some("settings"));
        assert_eq!(route.params, vec!["tab=privacy", "mode=dark"]);
    }

    #[test]
    fn test_bare_segment_fallback() {
        let route = resolver().resolve("scheme://host/chase/df/plants");
        assert_eq!(route.feature_id(), Some("plants"));
        assert_eq!(route.route_name.as_deref(), Some("plants"));
    }

    #[test]
    fn test_missing_prefix_fails() {
        for raw in [
            "scheme://host/other/route/plants",
            "scheme://host/chase/route/plants",
            "scheme://host/",
            "plants",
        ] {
            let route = resolver().resolve(raw);
            assert!(!route.is_success(), "{raw} should fail");
            assert_eq!(route.feature_id(), None);
        }
    }

    #[test]
    fn test_blank_and_garbage_fail() {
        assert!(resolver().resolve("").failure_reason().is_some());
        assert!(resolver().resolve("   ").failure_reason().is_some());
        assert!(resolver().resolve("not a uri at all").failure_reason().is_some());
    }

    #[test]
    fn test_structurally_invalid_forms_fail() {
        for raw in [
            "scheme://host/chase/df",
            "scheme://host/chase/df/route",
            "scheme://host/chase/df/navigation/key",
            "scheme://host/chase/df/route/plants/extra",
            "scheme://host/chase/df/navigation/plants",
        ] {
            assert!(!resolver().resolve(raw).is_success(), "{raw} should fail");
        }
    }

    #[test]
    fn test_unrecognised_form_keeps_path_and_reason() {
        let route = resolver().resolve("scheme://host/chase/df/route/plants/extra?a=1");
        assert_eq!(route.path, "/chase/df/route/plants/extra");
        assert_eq!(route.failure_reason(), Some("Unrecognised route form: route/plants/extra"));
        assert!(route.params.is_empty());

        let empty = resolver().resolve("scheme://host/chase/df/");
        assert_eq!(empty.path, "/chase/df/");
        assert_eq!(empty.failure_reason(), Some("No route after prefix"));
    }

    #[test]
    fn test_bad_params_are_dropped_individually() {
        let route = resolver().resolve("scheme://host/chase/df/route/plants?a=1&=orphan&c=%FF&flag&d=x%20y");
        assert!(route.is_success());
        assert_eq!(route.params, vec!["a=1", "flag=", "d=x y"]);
    }
}
