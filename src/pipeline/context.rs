//! Context stage.
//!
//! # Steps
//! ```text
//! 1. Reject direct access to /WEB-INF and /META-INF (404)
//! 2. Wait while the context is paused for reload
//!    - if it was stopped meanwhile, hand over to the host's current context
//!      for the path, or answer 503 when there is none
//! 3. Resolve the wrapper (404 if none)
//! 4. Fire request-initialized on every listener; the first failure aborts
//! 5. Invoke the wrapper pipeline
//! 6. Fire request-destroyed on every listener; failures do not stop the rest
//! ```

use crate::listener::RequestEvent;
use crate::messages::message;
use crate::observability::metrics;
use crate::pipeline::{record_failure, Next, Valve, ValveError};
use crate::request::Request;
use crate::response::{emit_error, Response};
use crate::routing::mapper::map_wrapper;
use std::sync::Arc;

const PROTECTED_DIRS: [&str; 2] = ["/WEB-INF", "/META-INF"];

/// True if `relative` names a protected directory or something inside it.
pub fn is_protected_path(relative: &str) -> bool {
    PROTECTED_DIRS.iter().any(|dir| {
        relative.len() >= dir.len()
            && relative.is_char_boundary(dir.len())
            && relative[..dir.len()].eq_ignore_ascii_case(dir)
            && (relative.len() == dir.len() || relative.as_bytes()[dir.len()] == b'/')
    })
}

#[derive(Debug, Default)]
pub struct ContextValve;

impl Valve for ContextValve {
    fn name(&self) -> &'static str {
        "context"
    }

    fn invoke(
        &self,
        request: &mut Request,
        response: &mut Response,
        _next: Next<'_>,
    ) -> Result<(), ValveError> {
        let Some(context) = request.context().cloned() else {
            emit_error(response, 404, &message("context.notFound", &[&request.decoded_path()]));
            return Ok(());
        };

        if is_protected_path(context.relative_path(request.decoded_path())) {
            tracing::debug!(
                request_id = %request.request_id(),
                context = %context.path(),
                path = %request.decoded_path(),
                "Rejected protected path"
            );
            emit_error(response, 404, &message("context.notFound", &[&request.decoded_path()]));
            return Ok(());
        }

        let in_flight = context.gate().enter();
        if context.is_stopped() {
            drop(in_flight);
            let replacement = request
                .host()
                .and_then(|h| h.map_context(request.decoded_path()))
                .filter(|c| !Arc::ptr_eq(c, &context) && !c.is_stopped());
            return match replacement {
                Some(current) => {
                    tracing::debug!(
                        request_id = %request.request_id(),
                        context = %current.path(),
                        "Held request handed to replacement context"
                    );
                    request.set_context(Some(current.clone()));
                    map_wrapper(&current, request);
                    current.pipeline().invoke(request, response)
                }
                None => {
                    emit_error(response, 503, &message("context.stopped", &[&context.path()]));
                    Ok(())
                }
            };
        }
        if in_flight.waited() {
            map_wrapper(&context, request);
        }

        if request.wrapper().is_none() {
            emit_error(response, 404, &message("context.notFound", &[&request.decoded_path()]));
            return Ok(());
        }

        let listeners = context.listeners();
        if !listeners.is_empty() {
            let mut failure = None;
            {
                let mut event = RequestEvent::new(context.facade(), request);
                for entry in listeners.iter() {
                    if let Err(e) = entry.listener.request_initialized(&mut event) {
                        failure = Some((entry.name.clone(), e));
                        break;
                    }
                }
            }
            if let Some((name, e)) = failure {
                tracing::error!(
                    request_id = %request.request_id(),
                    context = %context.path(),
                    listener = %name,
                    "{}",
                    message("context.listenerInit", &[&name, &e])
                );
                metrics::record_listener_failure(context.path(), "initialized");
                record_failure(request, &name, &e);
                return Ok(());
            }
        }

        let result = request
            .wrapper()
            .cloned()
            .map(|wrapper| wrapper.pipeline().invoke(request, response))
            .unwrap_or(Ok(()));

        if !listeners.is_empty() {
            let mut failures = Vec::new();
            {
                let mut event = RequestEvent::new(context.facade(), request);
                for entry in listeners.iter() {
                    if let Err(e) = entry.listener.request_destroyed(&mut event) {
                        failures.push((entry.name.clone(), e));
                    }
                }
            }
            for (name, e) in failures {
                tracing::error!(
                    request_id = %request.request_id(),
                    context = %context.path(),
                    listener = %name,
                    "{}",
                    message("context.listenerDestroy", &[&name, &e])
                );
                metrics::record_listener_failure(context.path(), "destroyed");
                record_failure(request, &name, &e);
            }
        }

        drop(in_flight);
        result
    }
}
