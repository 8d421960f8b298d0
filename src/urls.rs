//! URL redaction and normalization
//!
//! All functions are pure and never fail: a URL that cannot be parsed is
//! handled with plain string operations instead.

use crate::config::{NetworkMetricsConfig, NormalizeQueryOptions};
use url::{form_urlencoded, Position, Url};

/// Value written in place of a redacted query parameter
pub const REDACTED: &str = "[REDACTED]";

/// Apply the `redact_url` hook, then mask every configured query parameter.
///
/// Parameter order and the raw encoding of untouched parameters are kept
/// as-is. Unparsable URLs are returned unchanged (after the hook).
pub fn redact(url: &str, config: &NetworkMetricsConfig) -> String {
    let rewritten = match &config.redact_url {
        Some(hook) => hook(url),
        None => url.to_string(),
    };

    if config.redact_query_params.is_empty() {
        return rewritten;
    }

    let Ok(mut parsed) = Url::parse(&rewritten) else {
        return rewritten;
    };
    let Some(query) = parsed.query() else {
        return rewritten;
    };

    let mut changed = false;
    let masked: Vec<String> = query
        .split('&')
        .map(|pair| {
            let raw_name = pair.split_once('=').map_or(pair, |(name, _)| name);
            match decode_name(pair) {
                Some(name) if config.redact_query_params.iter().any(|p| *p == name) => {
                    changed = true;
                    format!("{raw_name}={REDACTED}")
                }
                _ => pair.to_string(),
            }
        })
        .collect();

    if !changed {
        return rewritten;
    }

    parsed.set_query(Some(&masked.join("&")));
    parsed.to_string()
}

/// Redact, then filter query parameters through `normalize_query`.
///
/// Returns `origin + path`, followed by `?query` only when parameters remain.
pub fn normalize(url: &str, config: &NetworkMetricsConfig) -> String {
    let redacted = redact(url, config);

    match Url::parse(&redacted) {
        Ok(parsed) => {
            let base = origin_and_path(&parsed);
            let query = match (parsed.query(), &config.normalize_query) {
                (Some(query), Some(options)) => filter_query(query, options),
                (Some(query), None) => query.to_string(),
                (None, _) => String::new(),
            };
            if query.is_empty() {
                base
            } else {
                format!("{base}?{query}")
            }
        }
        Err(_) => naive_strip(&redacted).to_string(),
    }
}

/// `origin + path` with the query and fragment removed
pub fn strip_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => origin_and_path(&parsed),
        Err(_) => naive_strip(url).to_string(),
    }
}

/// Hostname of the URL, if it parses and has one
pub fn domain(url: &str) -> Option<String> {
    Url::parse(url).ok()?.host_str().map(str::to_string)
}

/// Path component of the URL, falling back to the text before any `?`
pub fn path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => naive_strip(url).to_string(),
    }
}

fn origin_and_path(parsed: &Url) -> String {
    let origin = parsed.origin();
    if origin.is_tuple() {
        format!("{}{}", origin.ascii_serialization(), parsed.path())
    } else {
        parsed[..Position::AfterPath].to_string()
    }
}

fn naive_strip(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

fn decode_name(pair: &str) -> Option<String> {
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
}

fn filter_query(query: &str, options: &NormalizeQueryOptions) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| decode_name(pair).is_some_and(|name| options.keeps(&name)))
        .collect::<Vec<_>>()
        .join("&")
}
