//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::filter::executor::ExecutionMode;
use crate::filter::DispatcherType;

/// Root configuration.
///
/// The default value describes a runnable tree: host `localhost` with a root
/// context serving `system::Hello` at `/` and `system::Echo` at `/echo/*`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Engine identity and defaults.
    pub engine: EngineSection,

    /// Virtual hosts and their contexts.
    pub hosts: Vec<HostConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Native acceleration library probe.
    pub native: NativeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            engine: EngineSection::default(),
            hosts: vec![HostConfig {
                name: "localhost".to_string(),
                aliases: vec!["127.0.0.1".to_string()],
                contexts: vec![ContextConfig {
                    path: "/".to_string(),
                    display_name: "ROOT".to_string(),
                    servlets: vec![
                        ServletConfig {
                            name: "hello".to_string(),
                            class: "system::Hello".to_string(),
                            parameters: HashMap::new(),
                            mappings: vec!["/".to_string()],
                        },
                        ServletConfig {
                            name: "echo".to_string(),
                            class: "system::Echo".to_string(),
                            parameters: HashMap::new(),
                            mappings: vec!["/echo/*".to_string()],
                        },
                    ],
                    ..ContextConfig::default()
                }],
            }],
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            native: NativeConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Engine identity.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSection {
    pub name: String,

    /// Host used when no host name or alias matches the request.
    pub default_host: String,

    /// Install the access-log valve on the engine pipeline.
    pub access_log: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            name: "valve".to_string(),
            default_host: "localhost".to_string(),
            access_log: true,
        }
    }
}

/// Virtual host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Host name (matched case-insensitively).
    pub name: String,

    pub aliases: Vec<String>,

    pub contexts: Vec<ContextConfig>,
}

/// One application under a host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Context path; `/` is the root context.
    pub path: String,

    pub display_name: String,

    /// May load restricted container classes.
    pub privileged: bool,

    /// Capture console output written while units initialize.
    pub swallow_output: bool,

    /// How container-initiated calls into application code run.
    pub executor: ExecutionMode,

    /// Context init parameters.
    pub parameters: HashMap<String, String>,

    pub filters: Vec<FilterConfig>,

    pub filter_mappings: Vec<FilterMappingConfig>,

    pub servlets: Vec<ServletConfig>,

    /// Request listener class ids, in firing order.
    pub listeners: Vec<String>,
}

/// Filter declaration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterConfig {
    pub name: String,

    pub class: String,

    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

/// Filter mapping onto URL patterns and/or servlet names.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FilterMappingConfig {
    /// Name of a declared filter.
    pub filter: String,

    #[serde(default)]
    pub url_patterns: Vec<String>,

    /// Servlet names; `*` matches every servlet.
    #[serde(default)]
    pub servlet_names: Vec<String>,

    /// Empty means `request` only.
    #[serde(default)]
    pub dispatchers: Vec<DispatcherType>,
}

/// Servlet declaration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServletConfig {
    pub name: String,

    pub class: String,

    #[serde(default)]
    pub parameters: HashMap<String, String>,

    /// URL patterns (`/exact`, `/prefix/*`, `*.ext`, `/`).
    #[serde(default)]
    pub mappings: Vec<String>,
}

/// Timeout configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Native acceleration library probe.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NativeConfig {
    pub enabled: bool,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
