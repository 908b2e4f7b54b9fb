//! Valve pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Engine::invoke
//!     → engine pipeline: [custom valves..] → EngineValve (pause, resolve host)
//!     → host pipeline:   [custom valves..] → HostValve   (resolve context)
//!     → context pipeline:[custom valves..] → ContextValve (path safety, pause,
//!                                            resolve wrapper, listener fan-out)
//!     → wrapper pipeline:[custom valves..] → WrapperValve (filter chain + handler)
//! ```
//!
//! # Design Decisions
//! - Each scope owns one pipeline; the basic valve is fixed at construction
//! - Custom valves are swapped in atomically and run in insertion order
//! - Basic valves are stateless about their scope: they read it from the
//!   request's mapping data, so pipelines hold no back-references
//! - Resolution failures become HTTP statuses, never errors

pub mod access_log;
pub mod context;
pub mod engine;
pub mod host;
pub mod wrapper;

use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::request::globals::{RecordedFailure, EXCEPTION_ATTR};
use crate::request::{AttributeHolder, Request};
use crate::response::{Response, ResponseError};
use crate::servlet::ServletError;

pub use access_log::AccessLogValve;
pub use context::ContextValve;
pub use engine::EngineValve;
pub use host::HostValve;
pub use wrapper::WrapperValve;

/// Errors a valve may surface to the engine.
#[derive(Debug, Error)]
pub enum ValveError {
    #[error(transparent)]
    Servlet(#[from] ServletError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

/// One interceptor in a scope's pipeline.
pub trait Valve: Send + Sync {
    fn name(&self) -> &'static str;

    /// Process the request; call `next.invoke(..)` to continue the pipeline.
    fn invoke(
        &self,
        request: &mut Request,
        response: &mut Response,
        next: Next<'_>,
    ) -> Result<(), ValveError>;
}

/// The remainder of a pipeline after the current valve.
pub struct Next<'a> {
    valves: &'a [Arc<dyn Valve>],
    basic: Option<&'a dyn Valve>,
}

impl<'a> Next<'a> {
    pub fn invoke(self, request: &mut Request, response: &mut Response) -> Result<(), ValveError> {
        match self.valves.split_first() {
            Some((valve, rest)) => valve.invoke(
                request,
                response,
                Next {
                    valves: rest,
                    basic: self.basic,
                },
            ),
            None => match self.basic {
                Some(basic) => basic.invoke(
                    request,
                    response,
                    Next {
                        valves: &[],
                        basic: None,
                    },
                ),
                None => Ok(()),
            },
        }
    }
}

/// Ordered custom valves ending in a basic valve.
pub struct Pipeline {
    valves: ArcSwap<Vec<Arc<dyn Valve>>>,
    basic: Arc<dyn Valve>,
}

impl Pipeline {
    pub fn new(basic: Arc<dyn Valve>) -> Self {
        Self {
            valves: ArcSwap::from_pointee(Vec::new()),
            basic,
        }
    }

    pub fn add_valve(&self, valve: Arc<dyn Valve>) {
        self.valves.rcu(|valves| {
            let mut next = valves.as_ref().clone();
            next.push(valve.clone());
            next
        });
    }

    /// Names of the custom valves followed by the basic valve.
    pub fn valve_names(&self) -> Vec<&'static str> {
        self.valves
            .load()
            .iter()
            .map(|v| v.name())
            .chain(std::iter::once(self.basic.name()))
            .collect()
    }

    pub fn invoke(&self, request: &mut Request, response: &mut Response) -> Result<(), ValveError> {
        let valves = self.valves.load_full();
        Next {
            valves: &valves,
            basic: Some(self.basic.as_ref()),
        }
        .invoke(request, response)
    }
}

/// Store a failure under the exception attribute for later error handling.
pub(crate) fn record_failure(
    request: &mut dyn AttributeHolder,
    origin: &str,
    error: &dyn std::fmt::Display,
) {
    request.set_attribute(
        EXCEPTION_ATTR,
        Arc::new(RecordedFailure::new(origin, error.to_string())),
    );
}
