//! Subscriber setup for the engine's `tracing` output.
//!
//! opchain never installs a subscriber on its own. The executor emits one
//! span per invocation (`resource`, `alias`, `target`, `invocation_id`) and
//! warns when a phase fails; the binder logs each bind at debug level and
//! mirrors its diagnostics as warnings. A host process that wants to see any
//! of this calls [`TracingSetup::init`] once at startup, usually with the
//! value produced by [`EngineConfig::from_env`](crate::EngineConfig::from_env).
//!
//! ```
//! use opchain_core::{TracingFormat, TracingSetup};
//!
//! TracingSetup::new()
//!     .with_format(TracingFormat::Compact)
//!     .with_env_filter("opchain_runtime=debug,opchain_bind=warn")
//!     .init();
//! ```

use core::fmt;
use core::str::FromStr;

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// How events are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Multi-line, colored. Meant for a terminal.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event, for log collectors.
    Json,
}

/// Error returned when parsing an unknown [`TracingFormat`] name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tracing format '{0}': expected pretty, compact or json")]
pub struct ParseFormatError(pub String);

impl FromStr for TracingFormat {
    type Err = ParseFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(ParseFormatError(other.to_string())),
        }
    }
}

impl fmt::Display for TracingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

/// Settings for the process-wide subscriber.
///
/// `OPCHAIN_LOG` and `OPCHAIN_LOG_FORMAT` map onto
/// [`with_env_filter`](Self::with_env_filter) and
/// [`with_format`](Self::with_format). Span events also switch on the
/// executor's per-phase spans when the setup is handed to a binder through
/// [`EngineConfig`](crate::EngineConfig).
///
/// ```
/// use opchain_core::{TracingFormat, TracingSetup};
/// use tracing::Level;
///
/// // Follow each invocation phase by phase.
/// let debugging = TracingSetup::new()
///     .with_level(Level::DEBUG)
///     .with_span_events(true);
/// assert!(debugging.span_events());
///
/// // Ship warnings about tolerated bind problems to a collector.
/// let collector = TracingSetup::new()
///     .with_format(TracingFormat::Json)
///     .with_env_filter("opchain_bind=warn");
/// assert_eq!(collector.env_filter(), Some("opchain_bind=warn"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingSetup {
    level: Level,
    format: TracingFormat,
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingSetup {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingSetup {
    /// Info level, pretty output, no directive, no span events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level used when no directive is given or it fails to parse.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets an `EnvFilter` directive such as `opchain_runtime=debug`.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Reports span enter and exit.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Returns the fallback level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the output format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    /// Returns the directive, if any.
    #[must_use]
    pub fn env_filter(&self) -> Option<&str> {
        self.env_filter.as_deref()
    }

    /// Returns whether span enter and exit are reported.
    #[must_use]
    pub fn span_events(&self) -> bool {
        self.span_events
    }

    /// Builds the filter: the directive if it parses, else the level.
    fn filter(&self) -> EnvFilter {
        self.env_filter
            .as_deref()
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .unwrap_or_else(|| EnvFilter::new(self.level.as_str()))
    }

    /// Installs the global subscriber.
    ///
    /// A subscriber installed earlier, by this call or by the host, is kept.
    pub fn init(&self) {
        let spans = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };
        let output = match self.format {
            TracingFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_span_events(spans)
                .boxed(),
            TracingFormat::Compact => tracing_subscriber::fmt::layer()
                .compact()
                .with_span_events(spans)
                .boxed(),
            TracingFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_span_events(spans)
                .boxed(),
        };

        let installed = tracing_subscriber::registry()
            .with(output)
            .with(self.filter())
            .try_init()
            .is_ok();
        if installed {
            tracing::debug!(format = %self.format, filter = ?self.env_filter, "opchain tracing installed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn format_names_parse_loosely() {
        assert_eq!("JSON".parse::<TracingFormat>(), Ok(TracingFormat::Json));
        assert_eq!(" compact ".parse::<TracingFormat>(), Ok(TracingFormat::Compact));
        assert_eq!(
            "xml".parse::<TracingFormat>(),
            Err(ParseFormatError("xml".to_string()))
        );
    }

    #[test]
    fn format_display_parses_back() {
        for format in [TracingFormat::Pretty, TracingFormat::Compact, TracingFormat::Json] {
            assert_eq!(format.to_string().parse::<TracingFormat>(), Ok(format));
        }
    }

    #[test]
    fn defaults_are_quiet_and_pretty() {
        let setup = TracingSetup::new();
        assert_eq!(setup.level(), Level::INFO);
        assert_eq!(setup.format(), TracingFormat::Pretty);
        assert_eq!(setup.env_filter(), None);
        assert!(!setup.span_events());
    }

    #[test]
    fn unparsable_directive_falls_back_to_level() {
        let setup = TracingSetup::new()
            .with_level(Level::WARN)
            .with_env_filter("opchain_bind=loud");
        assert_eq!(setup.filter().max_level_hint(), Some(LevelFilter::WARN));

        let setup = TracingSetup::new().with_env_filter("opchain_runtime=debug");
        assert_eq!(setup.filter().max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn repeated_init_keeps_first_subscriber() {
        let setup = TracingSetup::new().with_format(TracingFormat::Compact);
        setup.init();
        setup.init();
    }
}
