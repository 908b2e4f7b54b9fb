//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use valve_engine::builtin::system_registry;
use valve_engine::config::schema::{
    ContextConfig, FilterConfig, FilterMappingConfig, HostConfig, ServletConfig,
};
use valve_engine::config::EngineConfig;
use valve_engine::container::{Deployer, Engine};
use valve_engine::facade::{ConfigFacade, UnitConfig};
use valve_engine::filter::loader::ClassRegistry;
use valve_engine::filter::{Filter, FilterChain};
use valve_engine::listener::{RequestEvent, RequestListener};
use valve_engine::request::globals::{FORWARD_REQUEST_URI, INCLUDE_REQUEST_URI};
use valve_engine::request::{attribute_as, AttributeHolder, Request, ServletRequest};
use valve_engine::response::{Response, ServletResponse};
use valve_engine::servlet::{DispatchError, Handler, ServletError};

/// Records what application units saw.
#[derive(Default)]
pub struct Tracker {
    events: Mutex<Vec<String>>,
    pub handler_inits: AtomicUsize,
    pub filter_inits: AtomicUsize,
}

impl Tracker {
    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn handler_inits(&self) -> usize {
        self.handler_inits.load(Ordering::SeqCst)
    }

    pub fn filter_inits(&self) -> usize {
        self.filter_inits.load(Ordering::SeqCst)
    }
}

fn string_attr(request: &dyn ServletRequest, name: &str) -> String {
    request
        .attribute(name)
        .and_then(|v| attribute_as::<String>(&v).cloned())
        .unwrap_or_else(|| "none".to_string())
}

/// Counts its own initializations and says "counted".
struct Counter(Arc<Tracker>);

impl Handler for Counter {
    fn init(&mut self, _config: &ConfigFacade) -> Result<(), ServletError> {
        self.0.handler_inits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn service(
        &self,
        _request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        self.0.record("service");
        response.write(b"counted")?;
        Ok(())
    }
}

struct BrokenInit;

impl Handler for BrokenInit {
    fn init(&mut self, _config: &ConfigFacade) -> Result<(), ServletError> {
        Err(ServletError::failed("boom"))
    }

    fn service(
        &self,
        _request: &mut dyn ServletRequest,
        _response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        Ok(())
    }
}

struct GoesDown(Arc<Tracker>);

impl Handler for GoesDown {
    fn service(
        &self,
        _request: &mut dyn ServletRequest,
        _response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        self.0.record("down");
        Err(ServletError::Unavailable("maintenance".into()))
    }
}

/// Includes `target`, then reports whether the include attributes leaked.
#[derive(Default)]
struct Includer {
    target: String,
}

impl Handler for Includer {
    fn init(&mut self, config: &ConfigFacade) -> Result<(), ServletError> {
        self.target = config.init_parameter("target").unwrap_or_default();
        Ok(())
    }

    fn service(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        let dispatcher = request
            .dispatcher(&self.target)
            .ok_or_else(|| DispatchError::NotMapped(self.target.clone()))?;
        response.write(b"[outer]")?;
        dispatcher.include(request, response)?;
        let after = string_attr(request, INCLUDE_REQUEST_URI);
        response.write(format!("[after_include={}]", after).as_bytes())?;
        Ok(())
    }
}

/// Include target: tries to change status and headers, reports the include URI.
struct IncludeTarget;

impl Handler for IncludeTarget {
    fn service(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        response.set_status(418);
        response.set_header("x-inner", "1");
        let uri = string_attr(request, INCLUDE_REQUEST_URI);
        response.write(format!("[include_uri={}]", uri).as_bytes())?;
        Ok(())
    }
}

/// Writes something, then forwards to `target`. With `commit` set the buffer
/// is flushed first, so the forward must fail.
#[derive(Default)]
struct Forwarder {
    target: String,
    commit: bool,
}

impl Handler for Forwarder {
    fn init(&mut self, config: &ConfigFacade) -> Result<(), ServletError> {
        self.target = config.init_parameter("target").unwrap_or_default();
        self.commit = config.init_parameter("commit").is_some();
        Ok(())
    }

    fn service(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        let dispatcher = request
            .dispatcher(&self.target)
            .ok_or_else(|| DispatchError::NotMapped(self.target.clone()))?;
        response.write(b"discarded")?;
        if self.commit {
            response.flush_buffer();
        }
        dispatcher.forward(request, response)
    }
}

struct ForwardTarget;

impl Handler for ForwardTarget {
    fn service(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError> {
        let body = format!(
            "servlet_path={} path_info={} query={} forward_uri={}",
            request.servlet_path(),
            request.path_info().unwrap_or_default(),
            request.query_string().unwrap_or_default(),
            string_attr(request, FORWARD_REQUEST_URI),
        );
        response.write(body.as_bytes())?;
        Ok(())
    }
}

/// Records `filter:<label>` on every pass.
struct Mark {
    tracker: Arc<Tracker>,
    label: String,
}

impl Filter for Mark {
    fn init(&mut self, config: &dyn UnitConfig) -> Result<(), ServletError> {
        self.tracker.filter_inits.fetch_add(1, Ordering::SeqCst);
        self.label = config.init_parameter("label").unwrap_or_else(|| config.name());
        Ok(())
    }

    fn do_filter(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
        chain: &mut FilterChain<'_>,
    ) -> Result<(), ServletError> {
        self.tracker.record(format!("filter:{}", self.label));
        chain.do_filter(request, response)
    }
}

struct Recorder {
    tracker: Arc<Tracker>,
    tag: &'static str,
    fail_init: bool,
    fail_destroy: bool,
}

impl RequestListener for Recorder {
    fn request_initialized(&self, _event: &mut RequestEvent<'_>) -> Result<(), ServletError> {
        self.tracker.record(format!("init:{}", self.tag));
        if self.fail_init {
            return Err(ServletError::failed("listener init failed"));
        }
        Ok(())
    }

    fn request_destroyed(&self, _event: &mut RequestEvent<'_>) -> Result<(), ServletError> {
        self.tracker.record(format!("destroy:{}", self.tag));
        if self.fail_destroy {
            return Err(ServletError::failed("listener destroy failed"));
        }
        Ok(())
    }
}

fn register_recorder(
    registry: &mut ClassRegistry,
    tracker: &Arc<Tracker>,
    class: &str,
    tag: &'static str,
    fail_init: bool,
    fail_destroy: bool,
) {
    let tracker = tracker.clone();
    registry.register_listener(class, move || {
        Ok(Box::new(Recorder {
            tracker: tracker.clone(),
            tag,
            fail_init,
            fail_destroy,
        }))
    });
}

/// Application classes used by the `/app` context.
pub fn app_registry(tracker: &Arc<Tracker>) -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    let p = tracker.clone();
    registry.register_handler("app::Counter", move || Ok(Box::new(Counter(p.clone()))));
    registry.register_handler("app::BrokenInit", || Ok(Box::new(BrokenInit)));
    let p = tracker.clone();
    registry.register_handler("app::GoesDown", move || Ok(Box::new(GoesDown(p.clone()))));
    registry.register_handler("app::Includer", || Ok(Box::new(Includer::default())));
    registry.register_handler("app::IncludeTarget", || Ok(Box::new(IncludeTarget)));
    registry.register_handler("app::Forwarder", || Ok(Box::new(Forwarder::default())));
    registry.register_handler("app::ForwardTarget", || Ok(Box::new(ForwardTarget)));
    let p = tracker.clone();
    registry.register_filter("app::Mark", move || {
        Ok(Box::new(Mark {
            tracker: p.clone(),
            label: String::new(),
        }))
    });
    register_recorder(&mut registry, tracker, "app::RecorderA", "a", false, false);
    register_recorder(&mut registry, tracker, "app::RecorderB", "b", false, false);
    register_recorder(&mut registry, tracker, "app::FailsInit", "fails-init", true, false);
    register_recorder(&mut registry, tracker, "app::FailsDestroy", "fails-destroy", false, true);
    registry
}

pub fn servlet(name: &str, class: &str, mappings: &[&str]) -> ServletConfig {
    ServletConfig {
        name: name.to_string(),
        class: class.to_string(),
        parameters: HashMap::new(),
        mappings: mappings.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn servlet_with(name: &str, class: &str, mappings: &[&str], params: &[(&str, &str)]) -> ServletConfig {
    let mut config = servlet(name, class, mappings);
    config.parameters = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    config
}

pub fn filter(name: &str, class: &str) -> FilterConfig {
    FilterConfig {
        name: name.to_string(),
        class: class.to_string(),
        parameters: HashMap::new(),
    }
}

pub fn mapping(filter: &str, url_patterns: &[&str]) -> FilterMappingConfig {
    FilterMappingConfig {
        filter: filter.to_string(),
        url_patterns: url_patterns.iter().map(|p| p.to_string()).collect(),
        servlet_names: Vec::new(),
        dispatchers: Vec::new(),
    }
}

/// The `/app` context with every test servlet mapped.
pub fn app_context() -> ContextConfig {
    ContextConfig {
        path: "/app".to_string(),
        display_name: "app".to_string(),
        servlets: vec![
            servlet("counter", "app::Counter", &["/count"]),
            servlet("broken", "app::BrokenInit", &["/broken"]),
            servlet("down", "app::GoesDown", &["/down"]),
            servlet_with("includer", "app::Includer", &["/inc"], &[("target", "/target?x=1")]),
            servlet("include-target", "app::IncludeTarget", &["/target"]),
            servlet_with("forwarder", "app::Forwarder", &["/fwd"], &[("target", "/landing/x")]),
            servlet_with(
                "late-forwarder",
                "app::Forwarder",
                &["/late"],
                &[("target", "/landing/x"), ("commit", "yes")],
            ),
            servlet("forward-target", "app::ForwardTarget", &["/landing/*"]),
        ],
        ..ContextConfig::default()
    }
}

/// One host (`localhost`) with the demo root context and `app`.
pub fn engine_config(app: ContextConfig) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.engine.access_log = false;
    let mut root = config.hosts[0].contexts[0].clone();
    root.path = "/".to_string();
    config.hosts = vec![HostConfig {
        name: "localhost".to_string(),
        aliases: vec!["127.0.0.1".to_string()],
        contexts: vec![root, app],
    }];
    config
}

pub fn deployer(tracker: &Arc<Tracker>) -> Deployer {
    Deployer::new(system_registry()).with_application("/app", app_registry(tracker))
}

pub fn deploy(tracker: &Arc<Tracker>, app: ContextConfig) -> (Arc<Engine>, Deployer) {
    let deployer = deployer(tracker);
    let engine = deployer
        .deploy(&engine_config(app))
        .expect("deploy test engine");
    (engine, deployer)
}

/// Run a GET through the engine.
pub fn get(engine: &Engine, path: &str) -> Response {
    get_host(engine, "localhost", path)
}

pub fn get_host(engine: &Engine, host: &str, path: &str) -> Response {
    let mut request = Request::get(host, path);
    let mut response = Response::new();
    engine.invoke(&mut request, &mut response);
    response
}

pub fn body(response: &Response) -> String {
    String::from_utf8_lossy(response.body()).into_owned()
}
