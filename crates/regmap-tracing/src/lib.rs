//! Shared tracing configuration utilities for the regmap workspace.
//!
//! The helpers in this crate centralise how executables, integration tests,
//! and supporting tools install `tracing` subscribers. Routing setup through
//! a single crate avoids copy-pasting builder logic and keeps the logging
//! surface consistent across binaries.
//!
//! Every failing register-map operation emits a structured `tracing::error!`
//! event before it returns its error. Test suites that deliberately provoke
//! failures install the [`TracingConfig::for_silent`] profile so expected
//! errors do not pollute the test output.

use std::env;
use std::error::Error;
use std::fmt;

pub use tracing::{debug, error, info, trace, warn};

use tracing::Subscriber;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Configuration describing how the shared tracing subscriber should behave.
#[derive(Clone, Debug)]
pub struct TracingConfig {
    /// Optional tracing directives (e.g. `regmap_core=debug,info`). When
    /// absent the crate will fall back to `RUST_LOG` and finally to
    /// [`default_directive`](Self::default_directive).
    pub directives: Option<String>,
    /// Fallback directive used when neither [`directives`](Self::directives)
    /// nor `RUST_LOG` resolve to a valid filter.
    pub default_directive: String,
    /// Controls whether event targets (module paths) appear in output.
    pub include_targets: bool,
    /// Controls ANSI formatting. Disable for CI logs that strip colour codes.
    pub ansi: bool,
    /// Output format for the formatter layer.
    pub output: TracingOutput,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl TracingConfig {
    /// Returns a configuration tuned for local development (pretty, ANSI-enabled output).
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: true,
            output: TracingOutput::Pretty,
        }
    }

    /// Returns a configuration tuned for CI or log collection environments (JSON, no ANSI).
    pub fn for_ci() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            include_targets: true,
            ansi: false,
            output: TracingOutput::Json,
        }
    }

    /// Returns a configuration that discards every event.
    ///
    /// Negative tests drive operations into their failure paths on purpose;
    /// this profile keeps the resulting error events out of the output while
    /// leaving the returned error values untouched.
    pub fn for_silent() -> Self {
        Self {
            directives: Some("off".to_string()),
            default_directive: "off".to_string(),
            include_targets: false,
            ansi: false,
            output: TracingOutput::Compact,
        }
    }

    /// Build a configuration using environment hints.
    ///
    /// # Environment Variables
    ///
    /// - `REGMAP_TRACING_PROFILE` - Profile preset: `local` (default), `ci`, or `silent`
    /// - `REGMAP_TRACING_DIRECTIVES` - Overrides tracing directives
    /// - `REGMAP_TRACING_FORMAT` - Output format: `pretty`, `compact`, or `json`
    pub fn from_env() -> Self {
        let profile = env::var("REGMAP_TRACING_PROFILE")
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase();

        let mut config = match profile.as_str() {
            "ci" => Self::for_ci(),
            "silent" => Self::for_silent(),
            _ => Self::for_local(),
        };

        if let Ok(directives) = env::var("REGMAP_TRACING_DIRECTIVES") {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Ok(format) = env::var("REGMAP_TRACING_FORMAT") {
            if let Some(parsed) = TracingOutput::from_env_value(&format) {
                config.output = parsed;
                if matches!(config.output, TracingOutput::Json) {
                    config.ansi = false;
                }
            }
        }

        config
    }

    /// Resolve the `EnvFilter` to use for the subscriber.
    fn resolve_filter(&self) -> Result<EnvFilter, TracingSetupError> {
        if let Some(directives) = &self.directives {
            EnvFilter::try_new(directives).map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))
        } else {
            match EnvFilter::try_from_default_env() {
                Ok(filter) => Ok(filter),
                Err(_) => Ok(EnvFilter::new(self.default_directive.clone())),
            }
        }
    }
}

/// Errors surfaced when configuring the shared tracing subscriber fails.
#[derive(Debug)]
pub enum TracingSetupError {
    /// The provided directive string could not be parsed.
    InvalidFilter(String),
    /// Installing the global subscriber failed (usually because one is
    /// already set).
    SubscriberInit(tracing_subscriber::util::TryInitError),
}

impl fmt::Display for TracingSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TracingSetupError::InvalidFilter(msg) => {
                write!(f, "invalid tracing directive: {msg}")
            }
            TracingSetupError::SubscriberInit(err) => {
                write!(f, "failed to install global tracing subscriber: {err}")
            }
        }
    }
}

impl Error for TracingSetupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TracingSetupError::SubscriberInit(err) => Some(err),
            _ => None,
        }
    }
}

/// Build a `tracing` subscriber using the provided configuration.
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let (filter, fmt_layer) = subscriber_layers(config)?;
    Ok(Registry::default().with(fmt_layer).with(filter))
}

/// Build the filter and formatting layers for external composition.
pub fn subscriber_layers(
    config: &TracingConfig,
) -> Result<(EnvFilter, Box<dyn Layer<Registry> + Send + Sync>), TracingSetupError> {
    let filter = config.resolve_filter()?;
    let include_targets = config.include_targets;
    let ansi = config.ansi;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.output {
        TracingOutput::Compact => Box::new(
            tracing_fmt::layer()
                .compact()
                .with_target(include_targets)
                .with_ansi(ansi),
        ),
        TracingOutput::Pretty => Box::new(
            tracing_fmt::layer()
                .pretty()
                .with_target(include_targets)
                .with_ansi(ansi),
        ),
        TracingOutput::Json => Box::new(tracing_fmt::layer().json().with_target(include_targets).with_ansi(false)),
    };

    Ok((filter, layer))
}

/// Install the configured subscriber as the process-wide default.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    build_subscriber(config)?
        .try_init()
        .map_err(TracingSetupError::SubscriberInit)
}

/// Output format choices for the tracing formatter layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TracingOutput {
    Compact,
    Pretty,
    Json,
}

impl TracingOutput {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to serialize environment variable tests and prevent race conditions.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn reset_env(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn rejects_invalid_directive() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env(&["REGMAP_TRACING_DIRECTIVES", "RUST_LOG"]);
        let config = TracingConfig {
            directives: Some("=::invalid".to_string()),
            ..TracingConfig::default()
        };
        let result = build_subscriber(&config);
        assert!(matches!(result, Err(TracingSetupError::InvalidFilter(_))));
    }

    #[test]
    fn builds_with_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env(&["RUST_LOG"]);
        let config = TracingConfig::default();
        assert!(build_subscriber(&config).is_ok());
    }

    #[test]
    fn silent_profile_filters_everything() {
        let config = TracingConfig::for_silent();
        assert_eq!(config.directives.as_deref(), Some("off"));
        assert!(build_subscriber(&config).is_ok());
    }

    #[test]
    fn from_env_respects_profile_and_format() {
        let _guard = ENV_LOCK.lock().unwrap();
        reset_env(&[
            "REGMAP_TRACING_PROFILE",
            "REGMAP_TRACING_FORMAT",
            "REGMAP_TRACING_DIRECTIVES",
        ]);

        env::set_var("REGMAP_TRACING_PROFILE", "ci");
        env::set_var("REGMAP_TRACING_FORMAT", "compact");
        env::set_var("REGMAP_TRACING_DIRECTIVES", "regmap_core=debug");

        let config = TracingConfig::from_env();
        assert_eq!(config.directives.as_deref(), Some("regmap_core=debug"));
        assert!(!config.ansi);
        assert!(matches!(config.output, TracingOutput::Compact));

        reset_env(&[
            "REGMAP_TRACING_PROFILE",
            "REGMAP_TRACING_FORMAT",
            "REGMAP_TRACING_DIRECTIVES",
        ]);
    }
}
