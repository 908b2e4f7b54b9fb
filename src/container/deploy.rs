//! Building and updating the container tree from configuration.
//!
//! # Responsibilities
//! - Turn an `EngineConfig` into an engine with hosts and contexts
//! - Wire each context to the container registry and its application registry
//! - Apply a new configuration to a running engine
//!
//! # Design Decisions
//! - Unchanged contexts are left alone; changed content reloads in place
//!   under the context's pause gate
//! - A context whose settings (privilege, executor, parameters) changed is
//!   rebuilt and swapped in; the old one is stopped after the swap
//! - Apply keeps going after a failing context and reports the first failure

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::config::schema::{ContextConfig, EngineConfig, HostConfig};
use crate::config::validation::normalize_path;
use crate::container::context::{ContextContent, ContextSettings};
use crate::container::wrapper::ServletDef;
use crate::container::{Context, Engine, Host};
use crate::facade::ContextInfo;
use crate::filter::loader::{ClassRegistry, ScopeLoader, UnitLoader};
use crate::filter::{FilterDef, FilterMap, UnitError};
use crate::pipeline::AccessLogValve;
use crate::routing::UrlPattern;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("context '{context}': {source}")]
    Unit {
        context: String,
        #[source]
        source: UnitError,
    },

    #[error("context '{context}': invalid url pattern {pattern}")]
    Pattern { context: String, pattern: String },
}

/// Builds engines from configuration.
pub struct Deployer {
    system: Arc<dyn UnitLoader>,
    applications: HashMap<String, Arc<dyn UnitLoader>>,
    empty: Arc<dyn UnitLoader>,
}

impl Deployer {
    /// `system` resolves every `system::` class id.
    pub fn new(system: ClassRegistry) -> Self {
        Self {
            system: Arc::new(system),
            applications: HashMap::new(),
            empty: Arc::new(ClassRegistry::new()),
        }
    }

    /// Register the application classes of the context at `path`.
    pub fn with_application(mut self, path: &str, loader: impl UnitLoader + 'static) -> Self {
        self.applications
            .insert(normalize_path(path), Arc::new(loader));
        self
    }

    fn application_loader(&self, path: &str) -> Arc<dyn UnitLoader> {
        self.applications
            .get(path)
            .cloned()
            .unwrap_or_else(|| self.empty.clone())
    }

    pub fn deploy(&self, config: &EngineConfig) -> Result<Arc<Engine>, DeployError> {
        let engine = Arc::new(Engine::new(&config.engine.name, &config.engine.default_host));
        if config.engine.access_log {
            engine.pipeline().add_valve(Arc::new(AccessLogValve));
        }
        for host in &config.hosts {
            engine.add_host(self.build_host(host)?);
        }
        engine.set_applied_config(config.clone());
        tracing::info!(
            engine = %config.engine.name,
            hosts = config.hosts.len(),
            "Engine deployed"
        );
        Ok(engine)
    }

    fn build_host(&self, config: &HostConfig) -> Result<Arc<Host>, DeployError> {
        let host = Arc::new(Host::new(&config.name, &config.aliases));
        for context in &config.contexts {
            host.add_context(self.build_context(context)?);
        }
        Ok(host)
    }

    /// Build and start one context.
    pub fn build_context(&self, config: &ContextConfig) -> Result<Arc<Context>, DeployError> {
        let path = normalize_path(&config.path);
        let content = content_of(&path, config)?;
        let context = Arc::new(Context::new(ContextSettings {
            info: ContextInfo::new(&path, &config.display_name, config.parameters.clone()),
            loader: ScopeLoader::new(
                self.system.clone(),
                self.application_loader(&path),
                config.privileged,
                &path,
            ),
            swallow_output: config.swallow_output,
            executor: config.executor.executor(),
        }));
        context
            .install(&content)
            .map_err(|source| DeployError::Unit {
                context: path.clone(),
                source,
            })?;
        Ok(context)
    }

    /// Bring a running engine in line with `config`.
    pub fn apply(&self, engine: &Engine, config: &EngineConfig) -> Result<(), DeployError> {
        let previous = engine.applied_config();
        let mut first_error = None;

        engine.mapper().set_default_host(&config.engine.default_host);

        for host in engine.hosts().iter() {
            let kept = config
                .hosts
                .iter()
                .any(|h| h.name.eq_ignore_ascii_case(host.name()));
            if !kept {
                if let Some(removed) = engine.remove_host(host.name()) {
                    for context in removed.contexts().iter() {
                        context.stop();
                    }
                }
            }
        }

        for host_config in &config.hosts {
            let previous_host = previous.as_ref().and_then(|p| {
                p.hosts
                    .iter()
                    .find(|h| h.name.eq_ignore_ascii_case(&host_config.name))
            });
            let result = match engine.find_host(&host_config.name.to_lowercase()) {
                None => self.build_host(host_config).map(|host| engine.add_host(host)),
                Some(host) => self.apply_host(engine, host, host_config, previous_host),
            };
            if let Err(e) = result {
                tracing::error!(host = %host_config.name, error = %e, "Failed to apply host configuration");
                first_error.get_or_insert(e);
            }
        }

        engine.set_applied_config(config.clone());
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn apply_host(
        &self,
        engine: &Engine,
        host: Arc<Host>,
        config: &HostConfig,
        previous: Option<&HostConfig>,
    ) -> Result<(), DeployError> {
        let host = if host.aliases() != config.aliases.as_slice() {
            let replacement = Arc::new(Host::new(&config.name, &config.aliases));
            for context in host.contexts().iter() {
                replacement.add_context(context.clone());
            }
            engine.add_host(replacement.clone());
            replacement
        } else {
            host
        };

        let wanted: Vec<String> = config
            .contexts
            .iter()
            .map(|c| normalize_path(&c.path))
            .collect();
        for context in host.contexts().iter() {
            if !wanted.iter().any(|p| p == context.path()) {
                host.remove_context(context.path());
                context.stop();
            }
        }

        let mut first_error = None;
        for context_config in &config.contexts {
            let path = normalize_path(&context_config.path);
            let before = previous.and_then(|p| {
                p.contexts
                    .iter()
                    .find(|c| normalize_path(&c.path) == path)
            });
            let result = match (host.find_context(&path), before) {
                (Some(_), Some(before)) if before == context_config => Ok(()),
                (Some(context), Some(before)) if same_settings(before, context_config) => {
                    content_of(&path, context_config).and_then(|content| {
                        context
                            .reload(&content)
                            .map_err(|source| DeployError::Unit {
                                context: path.clone(),
                                source,
                            })
                    })
                }
                (existing, _) => self.build_context(context_config).map(|context| {
                    host.add_context(context);
                    if let Some(old) = existing {
                        old.stop();
                    }
                }),
            };
            if let Err(e) = result {
                tracing::error!(
                    host = %config.name,
                    context = %path,
                    error = %e,
                    "Failed to apply context configuration"
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn same_settings(a: &ContextConfig, b: &ContextConfig) -> bool {
    a.display_name == b.display_name
        && a.privileged == b.privileged
        && a.swallow_output == b.swallow_output
        && a.executor == b.executor
        && a.parameters == b.parameters
}

fn parse_pattern(context: &str, pattern: &str) -> Result<UrlPattern, DeployError> {
    UrlPattern::parse(pattern).ok_or_else(|| DeployError::Pattern {
        context: context.to_string(),
        pattern: pattern.to_string(),
    })
}

/// Declared content of a context.
fn content_of(path: &str, config: &ContextConfig) -> Result<ContextContent, DeployError> {
    let filters = config
        .filters
        .iter()
        .map(|f| FilterDef {
            name: f.name.clone(),
            class: f.class.clone(),
            parameters: f.parameters.clone(),
        })
        .collect();

    let mut filter_maps = Vec::with_capacity(config.filter_mappings.len());
    for mapping in &config.filter_mappings {
        let mut map = FilterMap::new(mapping.filter.clone());
        for pattern in &mapping.url_patterns {
            map = map.with_url_pattern(parse_pattern(path, pattern)?);
        }
        for name in &mapping.servlet_names {
            map = map.with_servlet_name(name.clone());
        }
        for dispatcher in &mapping.dispatchers {
            map = map.with_dispatcher(*dispatcher);
        }
        filter_maps.push(map);
    }

    let mut servlets = Vec::with_capacity(config.servlets.len());
    for servlet in &config.servlets {
        let mut def = ServletDef::new(servlet.name.clone(), servlet.class.clone());
        def.parameters = servlet.parameters.clone();
        for pattern in &servlet.mappings {
            def = def.with_mapping(parse_pattern(path, pattern)?);
        }
        servlets.push(def);
    }

    Ok(ContextContent {
        filters,
        filter_maps,
        servlets,
        listeners: config.listeners.clone(),
    })
}
