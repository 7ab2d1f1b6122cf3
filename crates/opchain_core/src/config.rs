//! Engine configuration.
//!
//! [`EngineConfig`] bundles the settings the engine reads at startup: how
//! tracing is set up and how wire routes are shaped. Values come from builder
//! methods or from the process environment via [`EngineConfig::from_env`].
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `OPCHAIN_LOG` | env-filter directive, e.g. `opchain_runtime=debug` |
//! | `OPCHAIN_LOG_FORMAT` | `pretty`, `compact` or `json` |
//! | `OPCHAIN_ROUTE_PREFIX` | prefix for every wire route |
//! | `OPCHAIN_MEMBER_PARAM` | member identifier placeholder (default `item_id`) |

use crate::tracing_setup::{ParseFormatError, TracingSetup};

/// Environment variable holding the tracing env-filter directive.
pub const ENV_LOG: &str = "OPCHAIN_LOG";
/// Environment variable holding the tracing output format.
pub const ENV_LOG_FORMAT: &str = "OPCHAIN_LOG_FORMAT";
/// Environment variable holding the wire route prefix.
pub const ENV_ROUTE_PREFIX: &str = "OPCHAIN_ROUTE_PREFIX";
/// Environment variable holding the member identifier placeholder.
pub const ENV_MEMBER_PARAM: &str = "OPCHAIN_MEMBER_PARAM";

/// Errors raised while reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The log format variable held an unknown value.
    #[error("invalid OPCHAIN_LOG_FORMAT: {0}")]
    LogFormat(#[from] ParseFormatError),

    /// The member parameter is not a valid identifier.
    #[error("invalid OPCHAIN_MEMBER_PARAM '{0}': expected [a-z_][a-z0-9_]*")]
    MemberParam(String),
}

/// Shape of generated wire routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    prefix: String,
    member_param: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            member_param: "item_id".to_string(),
        }
    }
}

impl RouteConfig {
    /// Creates the default route configuration (no prefix, `item_id`).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prefix prepended to every route.
    ///
    /// Leading and trailing slashes are normalized, so `"api"`, `"/api"` and
    /// `"/api/"` are equivalent.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        let trimmed = prefix.as_ref().trim_matches('/');
        self.prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    /// Sets the placeholder name used for member identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MemberParam`] if the name is not a lowercase
    /// identifier.
    pub fn with_member_param(mut self, name: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(ConfigError::MemberParam(name));
        }
        self.member_param = name;
        Ok(self)
    }

    /// Returns the normalized route prefix (empty or `/segment`).
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the member identifier placeholder.
    #[must_use]
    pub fn member_param(&self) -> &str {
        &self.member_param
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    tracing: TracingSetup,
    routes: RouteConfig,
}

impl EngineConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            config.tracing = config.tracing.with_env_filter(filter);
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.tracing = config.tracing.with_format(format.parse()?);
        }
        if let Some(prefix) = lookup(ENV_ROUTE_PREFIX) {
            config.routes = config.routes.with_prefix(prefix);
        }
        if let Some(param) = lookup(ENV_MEMBER_PARAM) {
            config.routes = config.routes.with_member_param(param)?;
        }

        Ok(config)
    }

    /// Replaces the tracing setup.
    #[must_use]
    pub fn with_tracing(mut self, tracing: TracingSetup) -> Self {
        self.tracing = tracing;
        self
    }

    /// Replaces the route configuration.
    #[must_use]
    pub fn with_routes(mut self, routes: RouteConfig) -> Self {
        self.routes = routes;
        self
    }

    /// Returns the tracing setup.
    #[must_use]
    pub fn tracing(&self) -> &TracingSetup {
        &self.tracing
    }

    /// Returns the route configuration.
    #[must_use]
    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracing_setup::TracingFormat;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = EngineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.routes().member_param(), "item_id");
        assert_eq!(config.routes().prefix(), "");
    }

    #[test]
    fn reads_every_variable() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (ENV_LOG, "opchain_runtime=debug"),
            (ENV_LOG_FORMAT, "json"),
            (ENV_ROUTE_PREFIX, "/api/"),
            (ENV_MEMBER_PARAM, "id"),
        ]))
        .unwrap();

        assert_eq!(config.tracing().env_filter(), Some("opchain_runtime=debug"));
        assert_eq!(config.tracing().format(), TracingFormat::Json);
        assert_eq!(config.routes().prefix(), "/api");
        assert_eq!(config.routes().member_param(), "id");
    }

    #[test]
    fn rejects_bad_format() {
        let err = EngineConfig::from_lookup(lookup_from(&[(ENV_LOG_FORMAT, "yaml")])).unwrap_err();
        assert!(matches!(err, ConfigError::LogFormat(_)));
    }

    #[test]
    fn rejects_bad_member_param() {
        let err =
            EngineConfig::from_lookup(lookup_from(&[(ENV_MEMBER_PARAM, "Item-Id")])).unwrap_err();
        assert_eq!(err, ConfigError::MemberParam("Item-Id".to_string()));
    }

    #[test]
    fn prefix_normalization() {
        assert_eq!(RouteConfig::new().with_prefix("api").prefix(), "/api");
        assert_eq!(RouteConfig::new().with_prefix("/").prefix(), "");
        assert_eq!(RouteConfig::new().with_prefix("/v1/api/").prefix(), "/v1/api");
    }
}
