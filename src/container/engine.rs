//! Engine: the top of the container tree.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::container::deploy::{DeployError, Deployer};
use crate::container::Host;
use crate::config::EngineConfig;
use crate::lifecycle::PauseGate;
use crate::pipeline::{EngineValve, Pipeline};
use crate::request::Request;
use crate::response::{emit_error, Response};
use crate::routing::Mapper;

pub struct Engine {
    name: String,
    mapper: Arc<Mapper>,
    gate: Arc<PauseGate>,
    pipeline: Pipeline,
    /// Configuration the tree was last deployed from.
    applied: ArcSwapOption<EngineConfig>,
}

impl Engine {
    pub fn new(name: &str, default_host: &str) -> Self {
        let mapper = Arc::new(Mapper::new(default_host));
        let gate = Arc::new(PauseGate::new());
        let pipeline = Pipeline::new(Arc::new(EngineValve::new(mapper.clone(), gate.clone())));
        Self {
            name: name.to_string(),
            mapper,
            gate,
            pipeline,
            applied: ArcSwapOption::empty(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mapper(&self) -> &Arc<Mapper> {
        &self.mapper
    }

    pub fn gate(&self) -> &PauseGate {
        &self.gate
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn applied_config(&self) -> Option<Arc<EngineConfig>> {
        self.applied.load_full()
    }

    pub(crate) fn set_applied_config(&self, config: EngineConfig) {
        self.applied.store(Some(Arc::new(config)));
    }

    pub fn hosts(&self) -> Arc<Vec<Arc<Host>>> {
        self.mapper.hosts()
    }

    pub fn find_host(&self, name: &str) -> Option<Arc<Host>> {
        self.hosts().iter().find(|h| h.name() == name).cloned()
    }

    pub fn add_host(&self, host: Arc<Host>) {
        tracing::info!(engine = %self.name, host = %host.name(), "Host added");
        self.mapper.add_host(host);
    }

    /// Remove a host once no request is in flight anywhere in the engine.
    pub fn remove_host(&self, name: &str) -> Option<Arc<Host>> {
        let _paused = self.gate.pause_and_drain();
        let removed = self.mapper.remove_host(name);
        if removed.is_some() {
            tracing::info!(engine = %self.name, host = %name, "Host removed");
        }
        removed
    }

    /// Map and process one request. Blocks while the engine or the selected
    /// context is paused.
    pub fn invoke(&self, request: &mut Request, response: &mut Response) {
        self.mapper.map(request);
        if let Err(e) = self.pipeline.invoke(request, response) {
            tracing::error!(
                request_id = %request.request_id(),
                error = %e,
                "Pipeline failed"
            );
            emit_error(response, 500, &e.to_string());
        }
    }

    /// Bring the running tree in line with `config`.
    pub fn apply_config(
        &self,
        config: &EngineConfig,
        deployer: &Deployer,
    ) -> Result<(), DeployError> {
        deployer.apply(self, config)
    }

    /// Release every unit in every context.
    pub fn stop(&self) {
        for host in self.hosts().iter() {
            for context in host.contexts().iter() {
                context.stop();
            }
        }
        tracing::info!(engine = %self.name, "Engine stopped");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("name", &self.name)
            .field("default_host", &self.mapper.default_host())
            .finish()
    }
}
