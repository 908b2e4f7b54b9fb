//! Processing-unit contract and application-level errors.

use thiserror::Error;

use crate::facade::ConfigFacade;
use crate::filter::UnitError;
use crate::request::ServletRequest;
use crate::response::{ResponseError, ServletResponse};

/// Errors raised by application code (handlers, filters, listeners).
#[derive(Debug, Error)]
pub enum ServletError {
    #[error("{0}")]
    Failed(String),

    /// The unit cannot serve requests right now.
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Unit(#[from] UnitError),
}

impl ServletError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Errors raised by include/forward.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("cannot forward after the response has been committed")]
    Committed,

    #[error("no servlet mapped for path {0}")]
    NotMapped(String),
}

/// Servlet-equivalent processing unit, the innermost target of a dispatch.
pub trait Handler: Send + Sync {
    /// Called once before the first request, with a read-only view of the unit's configuration.
    fn init(&mut self, _config: &ConfigFacade) -> Result<(), ServletError> {
        Ok(())
    }

    fn service(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
    ) -> Result<(), ServletError>;

    fn destroy(&self) -> Result<(), ServletError> {
        Ok(())
    }
}
