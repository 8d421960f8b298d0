//! Per-event tracking decisions

use crate::config::NetworkMetricsConfig;
use crate::events::RequestEvent;
use crate::matcher::matches_any;
use crate::urls;

/// Static allow/deny rules. Deny lists always win; empty allow lists do not
/// restrict anything.
pub fn should_track(
    url: &str,
    method: &str,
    resource_type: &str,
    config: &NetworkMetricsConfig,
) -> bool {
    if matches_any(url, &config.deny_url_patterns) {
        return false;
    }
    if !config.allow_url_patterns.is_empty() && !matches_any(url, &config.allow_url_patterns) {
        return false;
    }

    let domain = urls::domain(url).unwrap_or_default();
    if matches_any(&domain, &config.exclude_domains) {
        return false;
    }
    if !config.include_domains.is_empty() && !matches_any(&domain, &config.include_domains) {
        return false;
    }

    if contains_method(&config.deny_methods, method) {
        return false;
    }
    if !config.allow_methods.is_empty() && !contains_method(&config.allow_methods, method) {
        return false;
    }

    if config.deny_resource_types.iter().any(|t| t == resource_type) {
        return false;
    }
    if !config.allow_resource_types.is_empty()
        && !config.allow_resource_types.iter().any(|t| t == resource_type)
    {
        return false;
    }

    true
}

/// Static rules followed by the `should_track_request` hook
pub fn should_track_event(event: &RequestEvent, config: &NetworkMetricsConfig) -> bool {
    if !should_track(
        &event.url_with_query,
        &event.method,
        &event.resource_type,
        config,
    ) {
        return false;
    }
    match &config.should_track_request {
        Some(hook) => hook(event),
        None => true,
    }
}

fn contains_method(list: &[String], method: &str) -> bool {
    list.iter().any(|m| m.eq_ignore_ascii_case(method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::Matcher;

    const URL: &str = "https://api.example.com/v1/users?page=2";

    #[test]
    fn test_open_by_default() {
        let config = NetworkMetricsConfig::default();
        assert!(should_track(URL, "GET", "fetch", &config));
    }

    #[test]
    fn test_url_patterns() {
        let mut config = NetworkMetricsConfig::default();
        config.allow_url_patterns = vec![Matcher::glob("*/v1/*").unwrap()];
        assert!(should_track(URL, "GET", "fetch", &config));
        assert!(!should_track("https://api.example.com/v2/users", "GET", "fetch", &config));

        config.deny_url_patterns = vec![Matcher::regex("users").unwrap()];
        assert!(!should_track(URL, "GET", "fetch", &config));
    }

    #[test]
    fn test_domains() {
        let mut config = NetworkMetricsConfig::default();
        config.include_domains = vec![Matcher::glob("*.example.com").unwrap()];
        assert!(should_track(URL, "GET", "fetch", &config));
        assert!(!should_track("https://cdn.other.net/x.js", "GET", "script", &config));

        config.exclude_domains = vec![Matcher::glob("api.*").unwrap()];
        assert!(!should_track(URL, "GET", "fetch", &config));
    }

    #[test]
    fn test_include_domains_rejects_unparsable_urls() {
        let mut config = NetworkMetricsConfig::default();
        config.include_domains = vec![Matcher::glob("*.example.com").unwrap()];
        assert!(!should_track("/relative", "GET", "fetch", &config));
    }

    #[test]
    fn test_methods() {
        let mut config = NetworkMetricsConfig::default();
        config.allow_methods = vec!["GET".into(), "POST".into()];
        assert!(should_track(URL, "get", "fetch", &config));
        assert!(!should_track(URL, "DELETE", "fetch", &config));

        config.deny_methods = vec!["GET".into()];
        assert!(!should_track(URL, "GET", "fetch", &config));
        assert!(should_track(URL, "POST", "fetch", &config));
    }

    #[test]
    fn test_resource_types() {
        let mut config = NetworkMetricsConfig::default();
        config.allow_resource_types = vec!["fetch".into()];
        assert!(should_track(URL, "GET", "fetch", &config));
        assert!(!should_track(URL, "GET", "image", &config));

        config.deny_resource_types = vec!["fetch".into()];
        assert!(!should_track(URL, "GET", "fetch", &config));
    }

    #[test]
    fn test_hook_runs_after_static_rules() {
        let mut config = NetworkMetricsConfig::default()
            .with_should_track_request(|event| event.status != Some(304));
        let ok = RequestEvent::new("GET", URL, "fetch", 5.0);
        let cached = RequestEvent::new("GET", URL, "fetch", 5.0).with_status(304);
        assert!(should_track_event(&ok, &config));
        assert!(!should_track_event(&cached, &config));

        config.deny_methods = vec!["GET".into()];
        assert!(!should_track_event(&ok, &config));
    }
}
