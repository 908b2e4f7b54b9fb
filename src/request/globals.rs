//! Well-known request attribute names.

pub const INCLUDE_REQUEST_URI: &str = "javax.servlet.include.request_uri";
pub const INCLUDE_CONTEXT_PATH: &str = "javax.servlet.include.context_path";
pub const INCLUDE_SERVLET_PATH: &str = "javax.servlet.include.servlet_path";
pub const INCLUDE_PATH_INFO: &str = "javax.servlet.include.path_info";
pub const INCLUDE_QUERY_STRING: &str = "javax.servlet.include.query_string";

pub const FORWARD_REQUEST_URI: &str = "javax.servlet.forward.request_uri";
pub const FORWARD_CONTEXT_PATH: &str = "javax.servlet.forward.context_path";
pub const FORWARD_SERVLET_PATH: &str = "javax.servlet.forward.servlet_path";
pub const FORWARD_PATH_INFO: &str = "javax.servlet.forward.path_info";
pub const FORWARD_QUERY_STRING: &str = "javax.servlet.forward.query_string";

/// Attribute carrying a failure raised mid-dispatch, for error-page handling.
pub const EXCEPTION_ATTR: &str = "javax.servlet.error.exception";

/// Names that live only in a dispatch overlay and never reach the wrapped request.
pub const SPECIALS: [&str; 10] = [
    INCLUDE_REQUEST_URI,
    INCLUDE_CONTEXT_PATH,
    INCLUDE_SERVLET_PATH,
    INCLUDE_PATH_INFO,
    INCLUDE_QUERY_STRING,
    FORWARD_REQUEST_URI,
    FORWARD_CONTEXT_PATH,
    FORWARD_SERVLET_PATH,
    FORWARD_PATH_INFO,
    FORWARD_QUERY_STRING,
];

pub fn is_special(name: &str) -> bool {
    SPECIALS.contains(&name)
}

/// Value stored under [`EXCEPTION_ATTR`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedFailure {
    /// Component that failed (listener, filter or handler name).
    pub origin: String,
    pub message: String,
}

impl RecordedFailure {
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            message: message.into(),
        }
    }
}
