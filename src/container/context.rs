//! Context: one deployed application under a host.
//!
//! # Responsibilities
//! - Own the filter units, servlet wrappers and request listeners of one application
//! - Map context-relative paths to wrappers
//! - Build filter chains per dispatch
//! - Reload its content under its pause gate
//!
//! # Design Decisions
//! - Content lists live behind arc-swap; the request path never blocks on them
//! - Reload pauses the context and drains in-flight requests before any unit
//!   is released, so no request sees a unit mid-destroy
//! - Filter units whose definition did not change survive a reload untouched

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::container::wrapper::{ServletDef, Wrapper};
use crate::dispatch::RequestDispatcher;
use crate::facade::{ContextFacade, ContextInfo};
use crate::filter::executor::Executor;
use crate::filter::loader::ScopeLoader;
use crate::filter::{DispatcherType, Filter, FilterDef, FilterMap, FilterUnit, ScopeServices, UnitError};
use crate::lifecycle::PauseGate;
use crate::listener::ListenerEntry;
use crate::pipeline::{ContextValve, Pipeline};
use crate::routing::matcher::{ContextPathMatcher, Matcher};
use crate::routing::UrlPattern;

/// Everything a context serves, as declared by configuration.
#[derive(Debug, Clone, Default)]
pub struct ContextContent {
    pub filters: Vec<FilterDef>,
    pub filter_maps: Vec<FilterMap>,
    pub servlets: Vec<ServletDef>,
    /// Listener class ids, in firing order.
    pub listeners: Vec<String>,
}

/// Construction-time settings of a context.
pub struct ContextSettings {
    pub info: ContextInfo,
    pub loader: ScopeLoader,
    pub swallow_output: bool,
    pub executor: Arc<dyn Executor>,
}

pub struct Context {
    info: Arc<ContextInfo>,
    services: Arc<ScopeServices>,
    matcher: ContextPathMatcher,
    filters: ArcSwap<HashMap<String, Arc<FilterUnit>>>,
    filter_maps: ArcSwap<Vec<FilterMap>>,
    wrappers: ArcSwap<HashMap<String, Arc<Wrapper>>>,
    servlet_mappings: ArcSwap<Vec<(UrlPattern, String)>>,
    listeners: ArcSwap<Vec<ListenerEntry>>,
    gate: PauseGate,
    pipeline: Pipeline,
}

impl Context {
    pub fn new(settings: ContextSettings) -> Self {
        let info = Arc::new(settings.info);
        let services = Arc::new(ScopeServices::new(
            ContextFacade::new(info.clone()),
            settings.loader,
            settings.swallow_output,
            settings.executor,
        ));
        Self {
            matcher: ContextPathMatcher::new(info.path.clone()),
            info,
            services,
            filters: ArcSwap::from_pointee(HashMap::new()),
            filter_maps: ArcSwap::from_pointee(Vec::new()),
            wrappers: ArcSwap::from_pointee(HashMap::new()),
            servlet_mappings: ArcSwap::from_pointee(Vec::new()),
            listeners: ArcSwap::from_pointee(Vec::new()),
            gate: PauseGate::new(),
            pipeline: Pipeline::new(Arc::new(ContextValve)),
        }
    }

    /// Context path, `""` for the root context.
    pub fn path(&self) -> &str {
        &self.info.path
    }

    pub fn display_name(&self) -> &str {
        &self.info.display_name
    }

    pub fn matches(&self, path: &str) -> bool {
        self.matcher.matches(path)
    }

    /// Strip the context path; the context root itself is `/`.
    pub fn relative_path<'a>(&self, path: &'a str) -> &'a str {
        let rest = path.strip_prefix(self.path()).unwrap_or(path);
        if rest.is_empty() {
            "/"
        } else {
            rest
        }
    }

    pub fn facade(&self) -> ContextFacade {
        self.services.context.clone()
    }

    pub fn services(&self) -> &Arc<ScopeServices> {
        &self.services
    }

    pub fn gate(&self) -> &PauseGate {
        &self.gate
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn listeners(&self) -> Arc<Vec<ListenerEntry>> {
        self.listeners.load_full()
    }

    pub fn filter_unit(&self, name: &str) -> Option<Arc<FilterUnit>> {
        self.filters.load().get(name).cloned()
    }

    pub fn filter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.filters.load().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn wrapper(&self, name: &str) -> Option<Arc<Wrapper>> {
        self.wrappers.load().get(name).cloned()
    }

    /// Bind a filter definition. The unit instantiates lazily.
    pub fn add_filter(&self, def: FilterDef) -> Arc<FilterUnit> {
        let unit = Arc::new(FilterUnit::new(def.clone(), self.services.clone()));
        let previous = self.filters.load().get(&def.name).cloned();
        self.filters.rcu(|filters| {
            let mut next = filters.as_ref().clone();
            next.insert(def.name.clone(), unit.clone());
            next
        });
        if let Some(previous) = previous {
            previous.release();
        }
        unit
    }

    pub fn add_filter_map(&self, map: FilterMap) {
        self.filter_maps.rcu(|maps| {
            let mut next = maps.as_ref().clone();
            next.push(map.clone());
            next
        });
    }

    pub fn add_wrapper(&self, def: &ServletDef) -> Arc<Wrapper> {
        let wrapper = Arc::new(Wrapper::new(def, self.services.clone()));
        self.wrappers.rcu(|wrappers| {
            let mut next = wrappers.as_ref().clone();
            next.insert(def.name.clone(), wrapper.clone());
            next
        });
        for pattern in &def.mappings {
            self.add_servlet_mapping(pattern.clone(), &def.name);
        }
        wrapper
    }

    pub fn add_servlet_mapping(&self, pattern: UrlPattern, servlet_name: &str) {
        self.servlet_mappings.rcu(|mappings| {
            let mut next: Vec<(UrlPattern, String)> = mappings
                .iter()
                .filter(|(p, _)| *p != pattern)
                .cloned()
                .collect();
            next.push((pattern.clone(), servlet_name.to_string()));
            next
        });
    }

    /// Instantiate a listener class and append it to the firing order.
    pub fn add_listener(&self, class: &str) -> Result<(), UnitError> {
        let entry = self.instantiate_listener(class)?;
        self.listeners.rcu(|listeners| {
            let mut next = listeners.as_ref().clone();
            next.push(entry.clone());
            next
        });
        Ok(())
    }

    fn instantiate_listener(&self, class: &str) -> Result<ListenerEntry, UnitError> {
        let listener = self.services.loader.instantiate_listener(class)?;
        Ok(ListenerEntry::new(class, Arc::from(listener)))
    }

    /// Select the wrapper for a context-relative path.
    ///
    /// Returns the wrapper with the servlet path / path info split.
    pub fn map_wrapper(&self, relative: &str) -> Option<(Arc<Wrapper>, String, Option<String>)> {
        let mappings = self.servlet_mappings.load();
        let (pattern, name) = mappings
            .iter()
            .filter(|(pattern, _)| pattern.matches(relative))
            .max_by_key(|(pattern, _)| pattern.rank())?;
        let wrapper = self.wrapper(name)?;
        let (servlet_path, path_info) = pattern.split(relative);
        Some((wrapper, servlet_path, path_info))
    }

    /// Dispatcher for a context-relative path (query string allowed).
    pub fn dispatcher(self: &Arc<Self>, path: &str) -> Option<RequestDispatcher> {
        let (path, query) = match path.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (path, None),
        };
        let (wrapper, servlet_path, path_info) = self.map_wrapper(path)?;
        Some(RequestDispatcher::new(
            self.clone(),
            wrapper,
            format!("{}{}", self.path(), path),
            servlet_path,
            path_info,
            query,
        ))
    }

    /// Filters to run in front of `wrapper` for a dispatch of `dispatcher` type.
    ///
    /// URL-pattern mappings come first, then servlet-name mappings, each in
    /// declaration order. Units instantiate on first use.
    pub fn filter_chain(
        &self,
        wrapper: &Wrapper,
        relative: &str,
        dispatcher: DispatcherType,
    ) -> Result<Vec<Arc<dyn Filter>>, UnitError> {
        let maps = self.filter_maps.load();
        let units = self.filters.load();
        let by_path = maps
            .iter()
            .filter(|m| m.applies_to(dispatcher) && m.matches_path(relative));
        let by_name = maps
            .iter()
            .filter(|m| m.applies_to(dispatcher) && m.matches_servlet(wrapper.name()));

        let mut chain = Vec::new();
        let mut seen: Vec<&str> = Vec::new();
        for map in by_path.chain(by_name) {
            if seen.contains(&map.filter_name.as_str()) {
                continue;
            }
            match units.get(&map.filter_name) {
                Some(unit) => {
                    chain.push(unit.filter()?);
                    seen.push(&map.filter_name);
                }
                None => tracing::debug!(
                    context = %self.path(),
                    filter = %map.filter_name,
                    "Mapping names an undefined filter"
                ),
            }
        }
        Ok(chain)
    }

    /// Eagerly instantiate every filter unit.
    ///
    /// Failures are logged; the first one is returned after all units were tried.
    pub fn start(&self) -> Result<(), UnitError> {
        let mut first = None;
        for unit in self.filters.load().values() {
            if let Err(e) = unit.filter() {
                tracing::error!(
                    context = %self.path(),
                    filter = %unit.filter_name(),
                    error = %e,
                    "Filter failed to start"
                );
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => {
                tracing::info!(context = %self.path(), "Context started");
                Ok(())
            }
        }
    }

    /// Install declared content on a fresh context.
    pub fn install(&self, content: &ContextContent) -> Result<(), UnitError> {
        for def in &content.filters {
            self.add_filter(def.clone());
        }
        for map in &content.filter_maps {
            self.add_filter_map(map.clone());
        }
        for servlet in &content.servlets {
            self.add_wrapper(servlet);
        }
        for class in &content.listeners {
            self.add_listener(class)?;
        }
        self.start()
    }

    /// Replace the context's content while it is paused and drained.
    ///
    /// Filter units whose definition changed are re-created; removed ones are
    /// released; unchanged ones keep their instance. Wrappers are always
    /// replaced. Listeners are instantiated before anything else changes, so
    /// a listener error leaves the context as it was.
    pub fn reload(&self, content: &ContextContent) -> Result<(), UnitError> {
        let listeners = content
            .listeners
            .iter()
            .map(|class| self.instantiate_listener(class))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(context = %self.path(), "Reloading context");
        let _paused = self.gate.pause_and_drain();

        let current = self.filters.load_full();
        let mut next = HashMap::new();
        let mut failure = None;
        for def in &content.filters {
            let unit = match current.get(&def.name) {
                Some(unit) => {
                    if unit.filter_def().as_deref() != Some(def) {
                        if let Err(e) = unit.set_filter_def(Some(def.clone())) {
                            tracing::error!(
                                context = %self.path(),
                                filter = %def.name,
                                error = %e,
                                "Filter failed to restart"
                            );
                            failure.get_or_insert(e);
                        }
                    }
                    unit.clone()
                }
                None => Arc::new(FilterUnit::new(def.clone(), self.services.clone())),
            };
            next.insert(def.name.clone(), unit);
        }
        for (name, unit) in current.iter() {
            if !next.contains_key(name) {
                if let Err(e) = unit.set_filter_def(None) {
                    tracing::debug!(filter = %name, error = %e, "Filter removal reported an error");
                }
            }
        }
        self.filters.store(Arc::new(next));
        self.filter_maps.store(Arc::new(content.filter_maps.clone()));

        for wrapper in self.wrappers.load().values() {
            wrapper.unload();
        }
        self.wrappers.store(Arc::new(HashMap::new()));
        self.servlet_mappings.store(Arc::new(Vec::new()));
        for servlet in &content.servlets {
            self.add_wrapper(servlet);
        }

        self.listeners.store(Arc::new(listeners));

        let started = self.start();
        match failure {
            Some(e) => Err(e),
            None => started,
        }
    }

    /// True once [`Context::stop`] has run.
    pub fn is_stopped(&self) -> bool {
        self.services.is_stopped()
    }

    /// Release every unit and refuse to create new ones. The context keeps
    /// its definitions. Requests held at the gate see the stopped flag once
    /// they are let through.
    pub fn stop(&self) {
        let _paused = self.gate.pause_and_drain();
        self.services.mark_stopped();
        for unit in self.filters.load().values() {
            unit.release();
        }
        for wrapper in self.wrappers.load().values() {
            wrapper.unload();
        }
        tracing::info!(context = %self.path(), "Context stopped");
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("path", &self.info.path)
            .field("display_name", &self.info.display_name)
            .finish()
    }
}
