//! Read-only views handed to application code.
//!
//! Handlers receive a [`ConfigFacade`] instead of the wrapper that owns them,
//! and every facade answers `servlet_context()` with a [`ContextFacade`]
//! instead of the context itself. Neither exposes reload, unload, pipeline or
//! unit management.

use std::collections::HashMap;
use std::sync::Arc;

/// Configuration surface shared by filter units and servlet wrappers.
pub trait UnitConfig: Send + Sync {
    fn name(&self) -> String;

    fn init_parameter(&self, name: &str) -> Option<String>;

    fn init_parameter_names(&self) -> Vec<String>;

    fn context(&self) -> ContextFacade;
}

/// Descriptive part of a context: what application code may read.
#[derive(Debug, Default)]
pub struct ContextInfo {
    pub(crate) path: String,
    pub(crate) display_name: String,
    pub(crate) parameters: HashMap<String, String>,
}

impl ContextInfo {
    pub fn new(path: &str, display_name: &str, parameters: HashMap<String, String>) -> Self {
        Self {
            path: path.to_string(),
            display_name: display_name.to_string(),
            parameters,
        }
    }
}

/// Capability-limited view of a context.
#[derive(Debug, Clone)]
pub struct ContextFacade {
    info: Arc<ContextInfo>,
}

impl ContextFacade {
    pub fn new(info: Arc<ContextInfo>) -> Self {
        Self { info }
    }

    /// Context path, `""` for the root context.
    pub fn context_path(&self) -> &str {
        &self.info.path
    }

    pub fn display_name(&self) -> &str {
        &self.info.display_name
    }

    pub fn init_parameter(&self, name: &str) -> Option<String> {
        self.info.parameters.get(name).cloned()
    }

    pub fn init_parameter_names(&self) -> Vec<String> {
        self.info.parameters.keys().cloned().collect()
    }

    pub fn server_info(&self) -> &'static str {
        concat!("valve-engine/", env!("CARGO_PKG_VERSION"))
    }
}

/// Capability-limited view of a unit's configuration.
#[derive(Clone)]
pub struct ConfigFacade {
    config: Arc<dyn UnitConfig>,
}

impl ConfigFacade {
    pub fn new(config: Arc<dyn UnitConfig>) -> Self {
        Self { config }
    }

    pub fn servlet_name(&self) -> String {
        self.config.name()
    }

    pub fn servlet_context(&self) -> ContextFacade {
        self.config.context()
    }

    pub fn init_parameter(&self, name: &str) -> Option<String> {
        self.config.init_parameter(name)
    }

    pub fn init_parameter_names(&self) -> Vec<String> {
        self.config.init_parameter_names()
    }
}

impl std::fmt::Debug for ConfigFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigFacade")
            .field("name", &self.config.name())
            .finish()
    }
}
