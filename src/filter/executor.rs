//! Execution modes for container-initiated calls into application code.
//!
//! The mode is chosen once when a context is built and injected into every
//! unit the context owns. `Direct` simply calls; `Privileged` runs the call in
//! its own span and contains panics, turning them into errors so teardown of
//! sibling units continues.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};

use crate::servlet::ServletError;

pub trait Executor: Send + Sync {
    fn execute(
        &self,
        action: &mut dyn FnMut() -> Result<(), ServletError>,
    ) -> Result<(), ServletError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectExecutor;

impl Executor for DirectExecutor {
    fn execute(
        &self,
        action: &mut dyn FnMut() -> Result<(), ServletError>,
    ) -> Result<(), ServletError> {
        action()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PrivilegedExecutor;

impl Executor for PrivilegedExecutor {
    fn execute(
        &self,
        action: &mut dyn FnMut() -> Result<(), ServletError>,
    ) -> Result<(), ServletError> {
        let span = tracing::debug_span!("privileged");
        let _entered = span.enter();
        match catch_unwind(AssertUnwindSafe(action)) {
            Ok(result) => result,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ServletError::Failed(format!("panicked: {}", reason)))
            }
        }
    }
}

/// Configured execution mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Direct,
    Privileged,
}

impl ExecutionMode {
    pub fn executor(self) -> std::sync::Arc<dyn Executor> {
        match self {
            ExecutionMode::Direct => std::sync::Arc::new(DirectExecutor),
            ExecutionMode::Privileged => std::sync::Arc::new(PrivilegedExecutor),
        }
    }
}
