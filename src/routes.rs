//! Route group resolution
//!
//! Resolution order, first applicable wins:
//! 1. the `route_group_fn` hook, when it returns a group
//! 2. the first `route_rules` entry whose matcher accepts the URL
//! 3. the identifier heuristic, which collapses numeric and hex/UUID-like
//!    path segments to `:id`

use crate::config::NetworkMetricsConfig;
use crate::urls;

/// Placeholder substituted for identifier-like path segments
pub const ID_PLACEHOLDER: &str = ":id";

const MIN_HEX_ID_LEN: usize = 6;

pub fn derive_route_group(url: &str, config: &NetworkMetricsConfig) -> String {
    if let Some(hook) = &config.route_group_fn {
        if let Some(group) = hook(url) {
            return group;
        }
    }

    if let Some(group) = apply_route_rules(url, config) {
        return group;
    }

    collapse_identifiers(&urls::path(url))
}

/// Group from the first matching explicit rule
pub fn apply_route_rules(url: &str, config: &NetworkMetricsConfig) -> Option<String> {
    config
        .route_rules
        .iter()
        .find(|rule| rule.matcher.matches(url))
        .map(|rule| rule.group.resolve(url))
}

/// All digits, or at least six characters of hex digits and hyphens
pub fn looks_like_id(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    if segment.bytes().all(|b| b.is_ascii_digit()) {
        return true;
    }
    segment.len() >= MIN_HEX_ID_LEN && segment.bytes().all(|b| b.is_ascii_hexdigit() || b == b'-')
}

fn collapse_identifiers(path: &str) -> String {
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if looks_like_id(segment) {
                ID_PLACEHOLDER
            } else {
                segment
            }
        })
        .collect();
    format!("/{}", segments.join("/"))
}
