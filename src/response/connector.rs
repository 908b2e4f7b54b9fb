//! Container-side response object.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::response::{ResponseError, ServletResponse};

pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Buffered response produced by one pass through the pipeline.
#[derive(Debug)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    body: Vec<u8>,
    committed: bool,
    content_length: Option<u64>,
    content_type: Option<String>,
    locale: Option<String>,
    buffer_size: usize,
    error: bool,
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body: Vec::new(),
            committed: false,
            content_length: None,
            content_type: None,
            locale: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            error: false,
        }
    }

    /// True once `send_error` has been called.
    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Split into parts for the HTTP layer.
    pub fn into_parts(self) -> (u16, HeaderMap, Option<String>, Vec<u8>) {
        (self.status, self.headers, self.content_type, self.body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl ServletResponse for Response {
    fn status(&self) -> u16 {
        self.status
    }

    fn set_status(&mut self, status: u16) {
        if !self.committed {
            self.status = status;
        }
    }

    fn is_committed(&self) -> bool {
        self.committed
    }

    fn send_error(&mut self, status: u16, message: &str) -> Result<(), ResponseError> {
        if self.committed {
            return Err(ResponseError::Committed("send error"));
        }
        self.status = status;
        self.error = true;
        self.body = message.as_bytes().to_vec();
        self.content_type = Some("text/plain; charset=utf-8".to_string());
        self.content_length = Some(self.body.len() as u64);
        self.committed = true;
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ResponseError> {
        if self.committed {
            return Err(ResponseError::Committed("reset"));
        }
        self.status = 200;
        self.headers.clear();
        self.body.clear();
        self.content_length = None;
        self.content_type = None;
        self.locale = None;
        self.error = false;
        Ok(())
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    fn set_content_length(&mut self, length: u64) {
        if !self.committed {
            self.content_length = Some(length);
        }
    }

    fn content_type(&self) -> Option<String> {
        self.content_type.clone()
    }

    fn set_content_type(&mut self, content_type: &str) {
        if !self.committed {
            self.content_type = Some(content_type.to_string());
        }
    }

    fn locale(&self) -> Option<String> {
        self.locale.clone()
    }

    fn set_locale(&mut self, locale: &str) {
        if !self.committed {
            self.locale = Some(locale.to_string());
        }
    }

    fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn set_buffer_size(&mut self, size: usize) {
        if !self.committed {
            self.buffer_size = size;
        }
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        if self.committed {
            return;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::debug!(header = %name, "Ignoring invalid response header"),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ResponseError> {
        if self.error {
            return Err(ResponseError::Committed("write after error"));
        }
        self.body.extend_from_slice(bytes);
        if self.body.len() > self.buffer_size {
            self.committed = true;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) {
        self.committed = true;
    }
}
