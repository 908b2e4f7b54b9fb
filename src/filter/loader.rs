//! Class resolution for pluggable units.
//!
//! # Responsibilities
//! - Map class identifiers to factories (filters, handlers, listeners)
//! - Keep container classes and application classes in separate registries
//! - Pick the registry by namespace (two-tier resolution)
//!
//! # Design Decisions
//! - Ids under `system::` resolve through the container registry only
//! - Everything else resolves through the owning context's registry, so two
//!   contexts can register the same id with different implementations
//! - Restricted container classes load only into privileged contexts

use std::collections::HashMap;
use std::sync::Arc;

use crate::filter::{Filter, UnitError};
use crate::listener::RequestListener;
use crate::servlet::Handler;

/// Reserved namespace of container-provided classes.
pub const SYSTEM_NAMESPACE: &str = "system::";

type Factory<T> = Arc<dyn Fn() -> Result<Box<T>, String> + Send + Sync>;

/// A registered class: how to build it and who may load it.
pub struct ClassEntry<T: ?Sized> {
    factory: Factory<T>,
    restricted: bool,
}

impl<T: ?Sized> Clone for ClassEntry<T> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            restricted: self.restricted,
        }
    }
}

impl<T: ?Sized> ClassEntry<T> {
    pub fn is_restricted(&self) -> bool {
        self.restricted
    }

    pub fn instantiate(&self) -> Result<Box<T>, String> {
        (self.factory)()
    }
}

/// Loader capability of one scope.
pub trait UnitLoader: Send + Sync {
    fn filter_class(&self, class: &str) -> Option<ClassEntry<dyn Filter>>;

    fn handler_class(&self, class: &str) -> Option<ClassEntry<dyn Handler>>;

    fn listener_class(&self, class: &str) -> Option<ClassEntry<dyn RequestListener>>;
}

/// In-memory class registry.
#[derive(Default)]
pub struct ClassRegistry {
    filters: HashMap<String, ClassEntry<dyn Filter>>,
    handlers: HashMap<String, ClassEntry<dyn Handler>>,
    listeners: HashMap<String, ClassEntry<dyn RequestListener>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_filter<F>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn Filter>, String> + Send + Sync + 'static,
    {
        self.filters.insert(
            class.to_string(),
            ClassEntry {
                factory: Arc::new(factory),
                restricted: false,
            },
        );
        self
    }

    /// Register a filter only privileged contexts may load.
    pub fn register_restricted_filter<F>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn Filter>, String> + Send + Sync + 'static,
    {
        self.filters.insert(
            class.to_string(),
            ClassEntry {
                factory: Arc::new(factory),
                restricted: true,
            },
        );
        self
    }

    pub fn register_handler<F>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn Handler>, String> + Send + Sync + 'static,
    {
        self.handlers.insert(
            class.to_string(),
            ClassEntry {
                factory: Arc::new(factory),
                restricted: false,
            },
        );
        self
    }

    /// Register a handler only privileged contexts may load.
    pub fn register_restricted_handler<F>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn Handler>, String> + Send + Sync + 'static,
    {
        self.handlers.insert(
            class.to_string(),
            ClassEntry {
                factory: Arc::new(factory),
                restricted: true,
            },
        );
        self
    }

    pub fn register_listener<F>(&mut self, class: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn RequestListener>, String> + Send + Sync + 'static,
    {
        self.listeners.insert(
            class.to_string(),
            ClassEntry {
                factory: Arc::new(factory),
                restricted: false,
            },
        );
        self
    }
}

impl UnitLoader for ClassRegistry {
    fn filter_class(&self, class: &str) -> Option<ClassEntry<dyn Filter>> {
        self.filters.get(class).cloned()
    }

    fn handler_class(&self, class: &str) -> Option<ClassEntry<dyn Handler>> {
        self.handlers.get(class).cloned()
    }

    fn listener_class(&self, class: &str) -> Option<ClassEntry<dyn RequestListener>> {
        self.listeners.get(class).cloned()
    }
}

/// Two-tier resolution: container registry for `system::`, scope registry otherwise.
#[derive(Clone)]
pub struct ScopeLoader {
    system: Arc<dyn UnitLoader>,
    scope: Arc<dyn UnitLoader>,
    privileged: bool,
    context: String,
}

impl ScopeLoader {
    pub fn new(
        system: Arc<dyn UnitLoader>,
        scope: Arc<dyn UnitLoader>,
        privileged: bool,
        context: &str,
    ) -> Self {
        Self {
            system,
            scope,
            privileged,
            context: context.to_string(),
        }
    }

    fn loader_for(&self, class: &str) -> &dyn UnitLoader {
        if class.starts_with(SYSTEM_NAMESPACE) {
            self.system.as_ref()
        } else {
            self.scope.as_ref()
        }
    }

    fn build<T: ?Sized>(
        &self,
        class: &str,
        entry: Option<ClassEntry<T>>,
    ) -> Result<Box<T>, UnitError> {
        let entry = entry.ok_or_else(|| UnitError::ClassNotFound {
            class: class.to_string(),
        })?;
        if entry.is_restricted() && !self.privileged {
            return Err(UnitError::Access {
                class: class.to_string(),
                context: self.context.clone(),
            });
        }
        entry
            .instantiate()
            .map_err(|reason| UnitError::Instantiation {
                class: class.to_string(),
                reason,
            })
    }

    pub fn instantiate_filter(&self, class: &str) -> Result<Box<dyn Filter>, UnitError> {
        self.build(class, self.loader_for(class).filter_class(class))
    }

    pub fn instantiate_handler(&self, class: &str) -> Result<Box<dyn Handler>, UnitError> {
        self.build(class, self.loader_for(class).handler_class(class))
    }

    pub fn instantiate_listener(
        &self,
        class: &str,
    ) -> Result<Box<dyn RequestListener>, UnitError> {
        self.build(class, self.loader_for(class).listener_class(class))
    }
}
