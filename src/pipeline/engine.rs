//! Engine stage: reload backpressure at the top of the tree, then host selection.

use std::sync::Arc;

use crate::lifecycle::PauseGate;
use crate::messages::message;
use crate::pipeline::{Next, Valve, ValveError};
use crate::request::Request;
use crate::response::{emit_error, Response};
use crate::routing::Mapper;

pub struct EngineValve {
    mapper: Arc<Mapper>,
    gate: Arc<PauseGate>,
}

impl EngineValve {
    pub fn new(mapper: Arc<Mapper>, gate: Arc<PauseGate>) -> Self {
        Self { mapper, gate }
    }
}

impl Valve for EngineValve {
    fn name(&self) -> &'static str {
        "engine"
    }

    fn invoke(
        &self,
        request: &mut Request,
        response: &mut Response,
        _next: Next<'_>,
    ) -> Result<(), ValveError> {
        let in_flight = self.gate.enter();
        if in_flight.waited() {
            // The host set may have changed while this request was held
            self.mapper.map(request);
        }

        let Some(host) = request.host().cloned() else {
            tracing::debug!(
                request_id = %request.request_id(),
                server_name = %request.server_name(),
                "No host matched"
            );
            emit_error(
                response,
                400,
                &message("engine.noHost", &[&request.server_name()]),
            );
            return Ok(());
        };

        host.pipeline().invoke(request, response)
    }
}
