//! Lifecycle-managed filter instance.
//!
//! # States
//! ```text
//! Defined   (definition bound, no instance)
//!     → filter(): instantiate + init  → Live
//!     → filter() fails                → Defined (nothing cached)
//! Live
//!     → release()                     → Defined (destroy called)
//!     → set_filter_def(Some(def))     → destroy old, instantiate new → Live
//!     → set_filter_def(None)          → Empty (destroy called)
//! Any state, once the scope is stopped
//!     → filter() fails with Stopped, nothing is instantiated
//! ```
//!
//! # Design Decisions
//! - Lazy init runs under the instance lock: at most one instance per unit
//! - The definition lives outside that lock, so `init` can read parameters
//!   back through the unit it was handed
//! - Destroy failures are logged, never returned

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwapOption;

use crate::facade::{ContextFacade, UnitConfig};
use crate::filter::capture;
use crate::filter::executor::Executor;
use crate::filter::loader::ScopeLoader;
use crate::filter::{Filter, FilterDef, UnitError};
use crate::messages::message;
use crate::observability::metrics;

/// Services a context lends to the units it owns.
pub struct ScopeServices {
    pub context: ContextFacade,
    pub loader: ScopeLoader,
    /// Capture console output written during unit init.
    pub swallow_output: bool,
    pub executor: Arc<dyn Executor>,
    stopped: AtomicBool,
}

impl ScopeServices {
    pub fn new(
        context: ContextFacade,
        loader: ScopeLoader,
        swallow_output: bool,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            context,
            loader,
            swallow_output,
            executor,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Refuse every later instantiation. There is no way back.
    pub(crate) fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Fails once the scope is stopped.
    pub(crate) fn ensure_running(&self) -> Result<(), UnitError> {
        if self.is_stopped() {
            return Err(UnitError::Stopped {
                context: self.context.context_path().to_string(),
            });
        }
        Ok(())
    }
}

pub struct FilterUnit {
    definition: ArcSwapOption<FilterDef>,
    instance: Mutex<Option<Arc<dyn Filter>>>,
    services: Arc<ScopeServices>,
}

impl FilterUnit {
    /// Bind a definition without instantiating it.
    pub fn new(definition: FilterDef, services: Arc<ScopeServices>) -> Self {
        Self {
            definition: ArcSwapOption::from_pointee(definition),
            instance: Mutex::new(None),
            services,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<dyn Filter>>> {
        self.instance.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn filter_def(&self) -> Option<Arc<FilterDef>> {
        self.definition.load_full()
    }

    /// Declared filter name, empty once the definition has been cleared.
    pub fn filter_name(&self) -> String {
        self.definition
            .load()
            .as_ref()
            .map(|d| d.name.clone())
            .unwrap_or_default()
    }

    pub fn is_instantiated(&self) -> bool {
        self.lock().is_some()
    }

    /// Return the live instance, creating and initializing it on first use.
    pub fn filter(&self) -> Result<Arc<dyn Filter>, UnitError> {
        let mut instance = self.lock();
        if let Some(filter) = instance.as_ref() {
            return Ok(filter.clone());
        }

        self.services.ensure_running()?;
        let definition = self.definition.load_full().ok_or(UnitError::MissingDefinition)?;
        let mut filter = self.services.loader.instantiate_filter(&definition.class)?;

        {
            let _capture = self
                .services
                .swallow_output
                .then(|| capture::start(&definition.name));
            filter.init(self).map_err(|source| UnitError::Init {
                name: definition.name.clone(),
                source: Box::new(source),
            })?;
        }

        let filter: Arc<dyn Filter> = Arc::from(filter);
        *instance = Some(filter.clone());
        metrics::record_filter_instantiated(self.services.context.context_path());
        tracing::debug!(
            context = %self.services.context.context_path(),
            filter = %definition.name,
            class = %definition.class,
            "Filter initialized"
        );
        Ok(filter)
    }

    /// Destroy and drop the live instance, if any.
    pub fn release(&self) {
        let taken = {
            let mut instance = self.lock();
            instance.take().map(|filter| (filter, self.filter_name()))
        };
        if let Some((filter, name)) = taken {
            self.destroy(filter, &name);
        }
    }

    fn destroy(&self, filter: Arc<dyn Filter>, name: &str) {
        let result = self.services.executor.execute(&mut || filter.destroy());
        if let Err(e) = result {
            tracing::error!(
                context = %self.services.context.context_path(),
                filter = %name,
                "{}",
                message("unit.destroyFailed", &[&name, &e])
            );
        }
    }

    /// Replace the definition. `None` releases; `Some` releases the old
    /// instance and eagerly creates the new one.
    ///
    /// The definition swap and the removal of the old instance happen under
    /// the instance lock, so a concurrent [`FilterUnit::filter`] never builds
    /// from the outgoing definition.
    pub fn set_filter_def(&self, definition: Option<FilterDef>) -> Result<(), UnitError> {
        let eager = definition.is_some();
        let outgoing = {
            let mut instance = self.lock();
            let name = self.filter_name();
            self.definition.store(definition.map(Arc::new));
            instance.take().map(|filter| (filter, name))
        };
        if let Some((filter, name)) = outgoing {
            self.destroy(filter, &name);
        }
        if eager {
            self.filter()?;
        }
        Ok(())
    }
}

impl UnitConfig for FilterUnit {
    fn name(&self) -> String {
        self.filter_name()
    }

    fn init_parameter(&self, name: &str) -> Option<String> {
        self.definition
            .load()
            .as_ref()
            .and_then(|d| d.parameters.get(name).cloned())
    }

    fn init_parameter_names(&self) -> Vec<String> {
        self.definition
            .load()
            .as_ref()
            .map(|d| d.parameters.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn context(&self) -> ContextFacade {
        self.services.context.clone()
    }
}

impl std::fmt::Debug for FilterUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterUnit")
            .field("name", &self.filter_name())
            .field("instantiated", &self.is_instantiated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::ContextInfo;
    use crate::filter::executor::DirectExecutor;
    use crate::filter::loader::ClassRegistry;
    use crate::filter::FilterChain;
    use crate::request::ServletRequest;
    use crate::response::ServletResponse;
    use crate::servlet::ServletError;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counters {
        created: AtomicUsize,
        inits: AtomicUsize,
        destroys: AtomicUsize,
        init_names: std::sync::Mutex<Vec<String>>,
    }

    struct TestFilter {
        counters: Arc<Counters>,
        fail_init: bool,
        fail_destroy: bool,
    }

    impl Filter for TestFilter {
        fn init(&mut self, config: &dyn UnitConfig) -> Result<(), ServletError> {
            self.counters.inits.fetch_add(1, Ordering::SeqCst);
            self.counters.init_names.lock().unwrap().push(config.name());
            write!(capture::console(), "init {}", config.name()).ok();
            if self.fail_init {
                return Err(ServletError::failed("init refused"));
            }
            Ok(())
        }

        fn do_filter(
            &self,
            request: &mut dyn ServletRequest,
            response: &mut dyn ServletResponse,
            chain: &mut FilterChain<'_>,
        ) -> Result<(), ServletError> {
            chain.do_filter(request, response)
        }

        fn destroy(&self) -> Result<(), ServletError> {
            self.counters.destroys.fetch_add(1, Ordering::SeqCst);
            if self.fail_destroy {
                return Err(ServletError::failed("destroy refused"));
            }
            Ok(())
        }
    }

    fn services(counters: &Arc<Counters>) -> Arc<ScopeServices> {
        let mut app = ClassRegistry::new();
        for (class, fail_init, fail_destroy) in [
            ("app::Ok", false, false),
            ("app::BadInit", true, false),
            ("app::BadDestroy", false, true),
        ] {
            let counters = counters.clone();
            app.register_filter(class, move || {
                counters.created.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(TestFilter {
                    counters: counters.clone(),
                    fail_init,
                    fail_destroy,
                }))
            });
        }
        Arc::new(ScopeServices::new(
            ContextFacade::new(Arc::new(ContextInfo::default())),
            ScopeLoader::new(Arc::new(ClassRegistry::new()), Arc::new(app), false, ""),
            true,
            Arc::new(DirectExecutor),
        ))
    }

    #[test]
    fn test_lazy_init_is_idempotent() {
        let counters = Arc::new(Counters::default());
        let unit = FilterUnit::new(FilterDef::new("ok", "app::Ok"), services(&counters));
        assert!(!unit.is_instantiated());

        let first = unit.filter().unwrap();
        let second = unit.filter().unwrap();
        let third = unit.filter().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&second, &third));
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
        assert_eq!(counters.inits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_after_failed_init_is_noop() {
        let counters = Arc::new(Counters::default());
        let unit = FilterUnit::new(FilterDef::new("bad", "app::BadInit"), services(&counters));

        assert!(matches!(unit.filter(), Err(UnitError::Init { .. })));
        assert!(!unit.is_instantiated());
        unit.release();
        assert_eq!(counters.destroys.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_release_destroys_once() {
        let counters = Arc::new(Counters::default());
        let unit = FilterUnit::new(FilterDef::new("ok", "app::Ok"), services(&counters));
        unit.filter().unwrap();
        unit.release();
        unit.release();
        assert_eq!(counters.destroys.load(Ordering::SeqCst), 1);
        assert!(!unit.is_instantiated());
    }

    #[test]
    fn test_destroy_failure_is_contained() {
        let counters = Arc::new(Counters::default());
        let unit = FilterUnit::new(
            FilterDef::new("bd", "app::BadDestroy"),
            services(&counters),
        );
        unit.filter().unwrap();
        unit.release();
        assert_eq!(counters.destroys.load(Ordering::SeqCst), 1);
        assert!(!unit.is_instantiated());
    }

    #[test]
    fn test_set_filter_def() {
        let counters = Arc::new(Counters::default());
        let unit = FilterUnit::new(FilterDef::new("ok", "app::Ok"), services(&counters));
        unit.filter().unwrap();

        unit.set_filter_def(Some(FilterDef::new("ok2", "app::Ok").with_parameter("k", "v")))
            .unwrap();
        assert_eq!(counters.destroys.load(Ordering::SeqCst), 1);
        assert_eq!(counters.created.load(Ordering::SeqCst), 2);
        assert!(unit.is_instantiated());
        assert_eq!(unit.filter_name(), "ok2");
        assert_eq!(unit.init_parameter("k").as_deref(), Some("v"));

        unit.set_filter_def(None).unwrap();
        assert_eq!(counters.destroys.load(Ordering::SeqCst), 2);
        assert!(matches!(unit.filter(), Err(UnitError::MissingDefinition)));
    }

    #[test]
    fn test_set_filter_def_propagates_failure() {
        let counters = Arc::new(Counters::default());
        let unit = FilterUnit::new(FilterDef::new("ok", "app::Ok"), services(&counters));
        let result = unit.set_filter_def(Some(FilterDef::new("x", "app::Unknown")));
        assert!(matches!(result, Err(UnitError::ClassNotFound { .. })));
        assert!(!unit.is_instantiated());
    }

    #[test]
    fn test_failed_init_releases_capture() {
        let counters = Arc::new(Counters::default());
        let unit = FilterUnit::new(FilterDef::new("bad", "app::BadInit"), services(&counters));
        assert_eq!(capture::depth(), 0);

        assert!(matches!(unit.filter(), Err(UnitError::Init { .. })));
        assert_eq!(counters.inits.load(Ordering::SeqCst), 1);
        assert_eq!(capture::depth(), 0);
    }

    #[test]
    fn test_stopped_scope_refuses_instances() {
        let counters = Arc::new(Counters::default());
        let services = services(&counters);
        let unit = FilterUnit::new(FilterDef::new("ok", "app::Ok"), services.clone());
        unit.filter().unwrap();
        unit.release();

        services.mark_stopped();
        assert!(matches!(unit.filter(), Err(UnitError::Stopped { .. })));
        assert!(!unit.is_instantiated());
        assert_eq!(counters.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_set_filter_def_never_serves_outgoing_definition() {
        let counters = Arc::new(Counters::default());
        let unit = Arc::new(FilterUnit::new(
            FilterDef::new("v0", "app::Ok"),
            services(&counters),
        ));
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let unit = unit.clone();
                let done = done.clone();
                std::thread::spawn(move || {
                    while !done.load(Ordering::SeqCst) {
                        unit.filter().unwrap();
                    }
                })
            })
            .collect();

        for version in 1..=50 {
            unit.set_filter_def(Some(FilterDef::new(format!("v{version}"), "app::Ok")))
                .unwrap();
            let names = counters.init_names.lock().unwrap();
            assert_eq!(names.last().map(String::as_str), Some(format!("v{version}").as_str()));
        }
        done.store(true, Ordering::SeqCst);
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(unit.filter_name(), "v50");
        let live = counters.created.load(Ordering::SeqCst) - counters.destroys.load(Ordering::SeqCst);
        assert_eq!(live, 1);
    }

    #[test]
    fn test_parameters_visible_during_init() {
        let counters = Arc::new(Counters::default());
        let def = FilterDef::new("ok", "app::Ok")
            .with_parameter("a", "1")
            .with_parameter("b", "2");
        let unit = FilterUnit::new(def, services(&counters));
        let mut names = unit.init_parameter_names();
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(unit.init_parameter("missing"), None);
        unit.filter().unwrap();
    }
}
