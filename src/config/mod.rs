//! Configuration for collection, filtering, grouping and reporting
//!
//! Everything that can be expressed as data is deserializable from TOML, YAML
//! or JSON (see [`loader`]). Hooks are code-only and installed with the
//! `with_*` builder methods.

use crate::error::{MetricsError, Result};
use crate::events::RequestEvent;
use crate::matcher::Matcher;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub mod loader;

pub use loader::{load_config, ConfigFormat};

/// Full-URL rewrite applied before query redaction
pub type RedactUrlFn = Arc<dyn Fn(&str) -> String + Send + Sync>;
/// Custom per-event tracking decision
pub type TrackRequestFn = Arc<dyn Fn(&RequestEvent) -> bool + Send + Sync>;
/// Route group override; `None` falls through to rules and the heuristic
pub type RouteGroupFn = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;
/// Group name computed from the matched URL
pub type ComputeGroupFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub const DEFAULT_OUTPUT_DIR: &str = "network-metrics-results";
pub const DEFAULT_TOP_N: usize = 5;

/// Which per-spec / per-test rollups the report carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReportScope {
    #[default]
    #[serde(rename = "run")]
    Run,
    #[serde(rename = "spec")]
    Spec,
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "run+spec")]
    RunAndSpec,
    #[serde(rename = "run+test")]
    RunAndTest,
}

impl ReportScope {
    pub fn includes_specs(self) -> bool {
        matches!(self, Self::Spec | Self::RunAndSpec)
    }

    pub fn includes_tests(self) -> bool {
        matches!(self, Self::Test | Self::RunAndTest)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Spec => "spec",
            Self::Test => "test",
            Self::RunAndSpec => "run+spec",
            Self::RunAndTest => "run+test",
        }
    }
}

impl fmt::Display for ReportScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportScope {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "run" => Ok(Self::Run),
            "spec" => Ok(Self::Spec),
            "test" => Ok(Self::Test),
            "run+spec" => Ok(Self::RunAndSpec),
            "run+test" => Ok(Self::RunAndTest),
            other => Err(MetricsError::config(format!(
                "unknown report scope '{other}' (expected run, spec, test, run+spec or run+test)"
            ))),
        }
    }
}

/// Query parameter filtering for the normalized-endpoint key
///
/// An allowlist, when present, keeps only the listed names (an empty
/// allowlist drops every parameter). The denylist always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct NormalizeQueryOptions {
    pub allowlist: Option<Vec<String>>,
    pub denylist: Option<Vec<String>>,
}

impl NormalizeQueryOptions {
    pub fn keeps(&self, name: &str) -> bool {
        if let Some(deny) = &self.denylist {
            if deny.iter().any(|d| d == name) {
                return false;
            }
        }
        match &self.allowlist {
            Some(allow) => allow.iter().any(|a| a == name),
            None => true,
        }
    }
}

/// Group produced by a matching route rule
#[derive(Clone)]
pub enum RouteGroupTarget {
    Literal(String),
    Computed(ComputeGroupFn),
}

impl RouteGroupTarget {
    pub fn resolve(&self, url: &str) -> String {
        match self {
            Self::Literal(group) => group.clone(),
            Self::Computed(f) => f(url),
        }
    }
}

impl fmt::Debug for RouteGroupTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(group) => f.debug_tuple("Literal").field(group).finish(),
            Self::Computed(_) => f.write_str("Computed(<fn>)"),
        }
    }
}

impl<'de> Deserialize<'de> for RouteGroupTarget {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::Literal)
    }
}

/// Ordered route grouping rule; the first matching rule wins
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    #[serde(rename = "match")]
    pub matcher: Matcher,
    pub group: RouteGroupTarget,
}

impl RouteRule {
    pub fn literal(matcher: Matcher, group: impl Into<String>) -> Self {
        Self {
            matcher,
            group: RouteGroupTarget::Literal(group.into()),
        }
    }

    pub fn computed<F>(matcher: Matcher, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            matcher,
            group: RouteGroupTarget::Computed(Arc::new(f)),
        }
    }
}

/// Network metrics configuration
///
/// List-valued filters treat an empty list as "not configured". Deny entries
/// always take precedence over allow entries.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct NetworkMetricsConfig {
    pub output_dir: PathBuf,
    /// Consumed by external renderers
    pub html: bool,
    pub report_scope: ReportScope,
    pub top_n: usize,
    /// Cap on duration samples kept per bucket; `None` keeps every sample
    pub max_samples_per_key: Option<usize>,

    pub include_domains: Vec<Matcher>,
    pub exclude_domains: Vec<Matcher>,
    pub allow_url_patterns: Vec<Matcher>,
    pub deny_url_patterns: Vec<Matcher>,
    pub allow_methods: Vec<String>,
    pub deny_methods: Vec<String>,
    #[serde(alias = "resourceTypes")]
    pub allow_resource_types: Vec<String>,
    pub deny_resource_types: Vec<String>,

    pub normalize_query: Option<NormalizeQueryOptions>,
    pub redact_query_params: Vec<String>,
    pub route_rules: Vec<RouteRule>,
    pub include_resource_type_by_domain: bool,

    #[serde(skip)]
    pub redact_url: Option<RedactUrlFn>,
    #[serde(skip)]
    pub should_track_request: Option<TrackRequestFn>,
    #[serde(skip)]
    pub route_group_fn: Option<RouteGroupFn>,
}

impl Default for NetworkMetricsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            html: false,
            report_scope: ReportScope::Run,
            top_n: DEFAULT_TOP_N,
            max_samples_per_key: None,
            include_domains: Vec::new(),
            exclude_domains: Vec::new(),
            allow_url_patterns: Vec::new(),
            deny_url_patterns: Vec::new(),
            allow_methods: Vec::new(),
            deny_methods: Vec::new(),
            allow_resource_types: Vec::new(),
            deny_resource_types: Vec::new(),
            normalize_query: None,
            redact_query_params: Vec::new(),
            route_rules: Vec::new(),
            include_resource_type_by_domain: false,
            redact_url: None,
            should_track_request: None,
            route_group_fn: None,
        }
    }
}

impl NetworkMetricsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_report_scope(mut self, scope: ReportScope) -> Self {
        self.report_scope = scope;
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_max_samples_per_key(mut self, max_samples: usize) -> Self {
        self.max_samples_per_key = Some(max_samples);
        self
    }

    pub fn with_redact_query_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redact_query_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_route_rule(mut self, rule: RouteRule) -> Self {
        self.route_rules.push(rule);
        self
    }

    pub fn with_redact_url<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.redact_url = Some(Arc::new(f));
        self
    }

    pub fn with_should_track_request<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestEvent) -> bool + Send + Sync + 'static,
    {
        self.should_track_request = Some(Arc::new(f));
        self
    }

    pub fn with_route_group_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.route_group_fn = Some(Arc::new(f));
        self
    }

    /// Apply `NETMETRICS_*` environment overrides
    pub fn merge_env_vars(&mut self) -> Result<()> {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source
    pub fn merge_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("NETMETRICS_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }

        if let Some(top_n) = lookup("NETMETRICS_TOP_N") {
            self.top_n = top_n.parse().map_err(|e| {
                MetricsError::config(format!("NETMETRICS_TOP_N='{top_n}': {e}"))
            })?;
        }

        if let Some(max) = lookup("NETMETRICS_MAX_SAMPLES") {
            let parsed = max.parse().map_err(|e| {
                MetricsError::config(format!("NETMETRICS_MAX_SAMPLES='{max}': {e}"))
            })?;
            self.max_samples_per_key = Some(parsed);
        }

        if let Some(scope) = lookup("NETMETRICS_REPORT_SCOPE") {
            self.report_scope = scope.parse()?;
        }

        Ok(())
    }

    /// Reject settings that cannot produce a meaningful report
    pub fn validate(&self) -> Result<()> {
        if self.max_samples_per_key == Some(0) {
            return Err(MetricsError::config(
                "maxSamplesPerKey must be at least 1 (omit it to keep every sample)",
            ));
        }
        for rule in &self.route_rules {
            if let RouteGroupTarget::Literal(group) = &rule.group {
                if group.is_empty() {
                    return Err(MetricsError::config(format!(
                        "route rule {:?} has an empty group name",
                        rule.matcher
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for NetworkMetricsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkMetricsConfig")
            .field("output_dir", &self.output_dir)
            .field("html", &self.html)
            .field("report_scope", &self.report_scope)
            .field("top_n", &self.top_n)
            .field("max_samples_per_key", &self.max_samples_per_key)
            .field("include_domains", &self.include_domains)
            .field("exclude_domains", &self.exclude_domains)
            .field("allow_url_patterns", &self.allow_url_patterns)
            .field("deny_url_patterns", &self.deny_url_patterns)
            .field("allow_methods", &self.allow_methods)
            .field("deny_methods", &self.deny_methods)
            .field("allow_resource_types", &self.allow_resource_types)
            .field("deny_resource_types", &self.deny_resource_types)
            .field("normalize_query", &self.normalize_query)
            .field("redact_query_params", &self.redact_query_params)
            .field("route_rules", &self.route_rules)
            .field(
                "include_resource_type_by_domain",
                &self.include_resource_type_by_domain,
            )
            .field("redact_url", &self.redact_url.is_some())
            .field("should_track_request", &self.should_track_request.is_some())
            .field("route_group_fn", &self.route_group_fn.is_some())
            .finish()
    }
}
