//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Take the default filter from configuration, let `RUST_LOG` override it

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    format!(
        "valve_engine={level},tower_http={level}",
        level = config.log_level
    )
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        let config = ObservabilityConfig {
            log_level: "debug".into(),
            ..ObservabilityConfig::default()
        };
        assert_eq!(
            default_directive(&config),
            "valve_engine=debug,tower_http=debug"
        );
    }
}
