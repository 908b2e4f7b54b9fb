//! Servlet wrapper: owns one handler and its configuration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::facade::{ConfigFacade, ContextFacade, UnitConfig};
use crate::filter::{capture, ScopeServices, UnitError};
use crate::pipeline::{Pipeline, WrapperValve};
use crate::routing::UrlPattern;
use crate::servlet::{Handler, ServletError};

/// Declared servlet: name, handler class, init parameters and URL mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServletDef {
    pub name: String,
    pub class: String,
    pub parameters: HashMap<String, String>,
    pub mappings: Vec<UrlPattern>,
}

impl ServletDef {
    pub fn new(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: class.into(),
            parameters: HashMap::new(),
            mappings: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_mapping(mut self, pattern: UrlPattern) -> Self {
        self.mappings.push(pattern);
        self
    }
}

struct WrapperConfig {
    name: String,
    parameters: HashMap<String, String>,
    context: ContextFacade,
}

impl UnitConfig for WrapperConfig {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn init_parameter(&self, name: &str) -> Option<String> {
        self.parameters.get(name).cloned()
    }

    fn init_parameter_names(&self) -> Vec<String> {
        self.parameters.keys().cloned().collect()
    }

    fn context(&self) -> ContextFacade {
        self.context.clone()
    }
}

pub struct Wrapper {
    config: Arc<WrapperConfig>,
    class: String,
    services: Arc<ScopeServices>,
    instance: Mutex<Option<Arc<dyn Handler>>>,
    available: AtomicBool,
    pipeline: Pipeline,
}

impl Wrapper {
    pub fn new(def: &ServletDef, services: Arc<ScopeServices>) -> Self {
        Self {
            config: Arc::new(WrapperConfig {
                name: def.name.clone(),
                parameters: def.parameters.clone(),
                context: services.context.clone(),
            }),
            class: def.class.clone(),
            services,
            instance: Mutex::new(None),
            available: AtomicBool::new(true),
            pipeline: Pipeline::new(Arc::new(WrapperValve)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<dyn Handler>>> {
        self.instance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
        if !available {
            tracing::warn!(
                context = %self.services.context.context_path(),
                servlet = %self.config.name,
                "Servlet marked unavailable"
            );
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_some()
    }

    /// Return the handler, instantiating and initializing it on first use.
    ///
    /// An `Unavailable` error from `init` marks the wrapper unavailable.
    pub fn allocate(&self) -> Result<Arc<dyn Handler>, ServletError> {
        let mut instance = self.lock();
        if let Some(handler) = instance.as_ref() {
            return Ok(handler.clone());
        }

        self.services.ensure_running()?;
        let mut handler = self.services.loader.instantiate_handler(&self.class)?;
        let facade = ConfigFacade::new(self.config.clone());
        let init = {
            let _capture = self
                .services
                .swallow_output
                .then(|| capture::start(&self.config.name));
            handler.init(&facade)
        };
        if let Err(e) = init {
            if matches!(e, ServletError::Unavailable(_)) {
                drop(instance);
                self.set_available(false);
                return Err(e);
            }
            return Err(UnitError::Init {
                name: self.config.name.clone(),
                source: Box::new(e),
            }
            .into());
        }

        let handler: Arc<dyn Handler> = Arc::from(handler);
        *instance = Some(handler.clone());
        tracing::debug!(
            context = %self.services.context.context_path(),
            servlet = %self.config.name,
            class = %self.class,
            "Servlet initialized"
        );
        Ok(handler)
    }

    /// Destroy the handler, if loaded.
    pub fn unload(&self) {
        let Some(handler) = self.lock().take() else {
            return;
        };
        if let Err(e) = self.services.executor.execute(&mut || handler.destroy()) {
            tracing::error!(
                context = %self.services.context.context_path(),
                servlet = %self.config.name,
                error = %e,
                "Servlet destroy failed"
            );
        }
    }
}

impl std::fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wrapper")
            .field("name", &self.config.name)
            .field("class", &self.class)
            .field("available", &self.is_available())
            .finish()
    }
}
