//! Response wrapper for nested dispatch.
//!
//! While `included` is set, the guard swallows calls that would change
//! response-level metadata (content length/type, locale, buffer size) or
//! discard buffered output. A reset on an already-committed response is still
//! delegated so the wrapped response reports its own error.

use crate::response::{ResponseError, ServletResponse};

pub struct ResponseGuard<R> {
    wrapped: R,
    included: bool,
}

impl<R: ServletResponse> ResponseGuard<R> {
    pub fn new(wrapped: R, included: bool) -> Self {
        Self { wrapped, included }
    }

    pub fn is_included(&self) -> bool {
        self.included
    }

    pub fn set_included(&mut self, included: bool) {
        self.included = included;
    }

    /// Swap the wrapped response; the included flag is kept.
    pub fn rebind(&mut self, wrapped: R) -> R {
        std::mem::replace(&mut self.wrapped, wrapped)
    }

    pub fn into_inner(self) -> R {
        self.wrapped
    }
}

impl<R: ServletResponse> ServletResponse for ResponseGuard<R> {
    fn status(&self) -> u16 {
        self.wrapped.status()
    }

    fn set_status(&mut self, status: u16) {
        self.wrapped.set_status(status)
    }

    fn is_committed(&self) -> bool {
        self.wrapped.is_committed()
    }

    fn send_error(&mut self, status: u16, message: &str) -> Result<(), ResponseError> {
        self.wrapped.send_error(status, message)
    }

    fn reset(&mut self) -> Result<(), ResponseError> {
        if !self.included || self.wrapped.is_committed() {
            self.wrapped.reset()
        } else {
            Ok(())
        }
    }

    fn content_length(&self) -> Option<u64> {
        self.wrapped.content_length()
    }

    fn set_content_length(&mut self, length: u64) {
        if !self.included {
            self.wrapped.set_content_length(length)
        }
    }

    fn content_type(&self) -> Option<String> {
        self.wrapped.content_type()
    }

    fn set_content_type(&mut self, content_type: &str) {
        if !self.included {
            self.wrapped.set_content_type(content_type)
        }
    }

    fn locale(&self) -> Option<String> {
        self.wrapped.locale()
    }

    fn set_locale(&mut self, locale: &str) {
        if !self.included {
            self.wrapped.set_locale(locale)
        }
    }

    fn buffer_size(&self) -> usize {
        self.wrapped.buffer_size()
    }

    fn set_buffer_size(&mut self, size: usize) {
        if !self.included {
            self.wrapped.set_buffer_size(size)
        }
    }

    fn header(&self, name: &str) -> Option<String> {
        self.wrapped.header(name)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        self.wrapped.set_header(name, value)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ResponseError> {
        self.wrapped.write(bytes)
    }

    fn flush_buffer(&mut self) {
        self.wrapped.flush_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Response;

    #[test]
    fn test_included_blocks_metadata() {
        let mut inner = Response::new();
        inner.set_content_type("text/html");
        {
            let mut guard = ResponseGuard::new(&mut inner, true);
            guard.set_content_length(10);
            guard.set_content_type("application/json");
            guard.set_locale("fr");
            guard.set_buffer_size(1);
            guard.write(b"fragment").unwrap();
            guard.reset().unwrap();
        }
        assert_eq!(inner.content_length(), None);
        assert_eq!(inner.content_type().as_deref(), Some("text/html"));
        assert_eq!(inner.locale(), None);
        assert_eq!(inner.buffer_size(), crate::response::connector::DEFAULT_BUFFER_SIZE);
        assert_eq!(inner.body(), b"fragment");
    }

    #[test]
    fn test_included_reset_on_committed_still_delegates() {
        let mut inner = Response::new();
        inner.flush_buffer();
        let mut guard = ResponseGuard::new(&mut inner, true);
        assert_eq!(guard.reset(), Err(ResponseError::Committed("reset")));
    }

    #[test]
    fn test_not_included_passes_through() {
        let mut inner = Response::new();
        {
            let mut guard = ResponseGuard::new(&mut inner, false);
            guard.set_content_length(10);
            guard.set_locale("de");
        }
        assert_eq!(inner.content_length(), Some(10));
        assert_eq!(inner.locale().as_deref(), Some("de"));
    }

    #[test]
    fn test_rebind_keeps_flag() {
        let mut first = Response::new();
        let mut second = Response::new();
        let mut guard = ResponseGuard::new(&mut first, true);
        guard.rebind(&mut second);
        assert!(guard.is_included());
        guard.set_included(false);
        guard.set_content_length(3);
        drop(guard);
        assert_eq!(second.content_length(), Some(3));
        assert_eq!(first.content_length(), None);
    }
}
