//! Response model subsystem.
//!
//! # Data Flow
//! ```text
//! connector.rs (container Response, buffered body)
//!     → pipeline valves / filters / handlers write through ServletResponse
//!     → guard.rs (ResponseGuard) during nested include/forward
//!     → http/response.rs converts to axum::Response
//! ```
//!
//! # Design Decisions
//! - Body is buffered; exceeding the buffer size commits the response
//! - `send_error` and `reset` fail once committed, like a real socket would
//! - Error emission helpers swallow those failures at the pipeline layer

pub mod connector;
pub mod guard;

use thiserror::Error;

pub use connector::Response;
pub use guard::ResponseGuard;

/// Errors raised by response operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// The operation needs an uncommitted response.
    #[error("response already committed: cannot {0}")]
    Committed(&'static str),
}

/// Response surface handed to filters and handlers.
pub trait ServletResponse: Send {
    fn status(&self) -> u16;

    fn set_status(&mut self, status: u16);

    fn is_committed(&self) -> bool;

    /// Replace the body with an error page for `status`.
    fn send_error(&mut self, status: u16, message: &str) -> Result<(), ResponseError>;

    /// Clear status, headers and buffered body.
    fn reset(&mut self) -> Result<(), ResponseError>;

    fn content_length(&self) -> Option<u64>;

    fn set_content_length(&mut self, length: u64);

    fn content_type(&self) -> Option<String>;

    fn set_content_type(&mut self, content_type: &str);

    fn locale(&self) -> Option<String>;

    fn set_locale(&mut self, locale: &str);

    fn buffer_size(&self) -> usize;

    fn set_buffer_size(&mut self, size: usize);

    fn header(&self, name: &str) -> Option<String>;

    fn set_header(&mut self, name: &str, value: &str);

    fn write(&mut self, bytes: &[u8]) -> Result<(), ResponseError>;

    /// Commit the response.
    fn flush_buffer(&mut self);
}

impl<T: ServletResponse + ?Sized> ServletResponse for &mut T {
    fn status(&self) -> u16 {
        (**self).status()
    }

    fn set_status(&mut self, status: u16) {
        (**self).set_status(status)
    }

    fn is_committed(&self) -> bool {
        (**self).is_committed()
    }

    fn send_error(&mut self, status: u16, message: &str) -> Result<(), ResponseError> {
        (**self).send_error(status, message)
    }

    fn reset(&mut self) -> Result<(), ResponseError> {
        (**self).reset()
    }

    fn content_length(&self) -> Option<u64> {
        (**self).content_length()
    }

    fn set_content_length(&mut self, length: u64) {
        (**self).set_content_length(length)
    }

    fn content_type(&self) -> Option<String> {
        (**self).content_type()
    }

    fn set_content_type(&mut self, content_type: &str) {
        (**self).set_content_type(content_type)
    }

    fn locale(&self) -> Option<String> {
        (**self).locale()
    }

    fn set_locale(&mut self, locale: &str) {
        (**self).set_locale(locale)
    }

    fn buffer_size(&self) -> usize {
        (**self).buffer_size()
    }

    fn set_buffer_size(&mut self, size: usize) {
        (**self).set_buffer_size(size)
    }

    fn header(&self, name: &str) -> Option<String> {
        (**self).header(name)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        (**self).set_header(name, value)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ResponseError> {
        (**self).write(bytes)
    }

    fn flush_buffer(&mut self) {
        (**self).flush_buffer()
    }
}

/// Emit an error status, swallowing the failure if the response is committed.
pub fn emit_error(response: &mut dyn ServletResponse, status: u16, message: &str) {
    if let Err(e) = response.send_error(status, message) {
        tracing::debug!(status, error = %e, "Could not emit error response");
    }
}
