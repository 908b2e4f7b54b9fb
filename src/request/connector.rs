//! Container-side request object.
//!
//! One `Request` exists per inbound HTTP request. The routing layer attaches the
//! selected host, context and wrapper before the engine pipeline runs; valves only
//! read those selections.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, Method, Uri};

use crate::container::{Context, Host, Wrapper};
use crate::dispatch::RequestDispatcher;
use crate::request::{AttributeHolder, AttributeValue, ServletRequest};

/// Routing decision attached to a request by the mapper.
#[derive(Clone, Default)]
pub struct MappingData {
    pub host: Option<Arc<Host>>,
    pub context: Option<Arc<Context>>,
    pub wrapper: Option<Arc<Wrapper>>,
}

impl std::fmt::Debug for MappingData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingData")
            .field("host", &self.host.as_ref().map(|h| h.name().to_string()))
            .field("context", &self.context.as_ref().map(|c| c.path().to_string()))
            .field("wrapper", &self.wrapper.as_ref().map(|w| w.name().to_string()))
            .finish()
    }
}

/// The original request as seen by the engine pipeline.
#[derive(Debug)]
pub struct Request {
    request_id: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    server_name: String,
    decoded_path: String,
    context_path: String,
    servlet_path: String,
    path_info: Option<String>,
    attributes: HashMap<String, AttributeValue>,
    mapping: MappingData,
}

impl Request {
    /// Create a request. The server name is taken from the Host header (port stripped).
    pub fn new(method: Method, uri: Uri, headers: HeaderMap) -> Self {
        let server_name = headers
            .get("host")
            .and_then(|h| h.to_str().ok())
            .map(strip_port)
            .or_else(|| uri.host().map(str::to_string))
            .unwrap_or_default();
        let decoded_path = decode_path(uri.path());

        Self {
            request_id: String::new(),
            method,
            uri,
            headers,
            server_name,
            decoded_path,
            context_path: String::new(),
            servlet_path: String::new(),
            path_info: None,
            attributes: HashMap::new(),
            mapping: MappingData::default(),
        }
    }

    /// Shorthand for a GET without headers, mostly for tests.
    pub fn get(server_name: &str, path: &str) -> Self {
        let uri: Uri = path.parse().unwrap_or_else(|_| Uri::from_static("/"));
        let mut request = Self::new(Method::GET, uri, HeaderMap::new());
        request.server_name = server_name.to_lowercase();
        request
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn set_request_id(&mut self, id: impl Into<String>) {
        self.request_id = id.into();
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Percent-decoded request path, used for routing and path-safety checks.
    pub fn decoded_path(&self) -> &str {
        &self.decoded_path
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn mapping(&self) -> &MappingData {
        &self.mapping
    }

    pub fn host(&self) -> Option<&Arc<Host>> {
        self.mapping.host.as_ref()
    }

    pub fn context(&self) -> Option<&Arc<Context>> {
        self.mapping.context.as_ref()
    }

    pub fn wrapper(&self) -> Option<&Arc<Wrapper>> {
        self.mapping.wrapper.as_ref()
    }

    pub fn set_host(&mut self, host: Option<Arc<Host>>) {
        self.mapping.host = host;
    }

    /// Attach the selected context and the context path it matched.
    pub fn set_context(&mut self, context: Option<Arc<Context>>) {
        self.context_path = context
            .as_ref()
            .map(|c| c.path().to_string())
            .unwrap_or_default();
        self.mapping.context = context;
    }

    /// Attach the selected wrapper and the servlet path / path info split.
    pub fn set_wrapper(
        &mut self,
        wrapper: Option<Arc<Wrapper>>,
        servlet_path: String,
        path_info: Option<String>,
    ) {
        self.mapping.wrapper = wrapper;
        self.servlet_path = servlet_path;
        self.path_info = path_info;
    }
}

impl AttributeHolder for Request {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.get(name).cloned()
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        self.attributes.insert(name.to_string(), value);
    }

    fn remove_attribute(&mut self, name: &str) {
        self.attributes.remove(name);
    }
}

impl ServletRequest for Request {
    fn method(&self) -> String {
        self.method.to_string()
    }

    fn request_uri(&self) -> String {
        self.uri.path().to_string()
    }

    fn context_path(&self) -> String {
        self.context_path.clone()
    }

    fn servlet_path(&self) -> String {
        self.servlet_path.clone()
    }

    fn path_info(&self) -> Option<String> {
        self.path_info.clone()
    }

    fn query_string(&self) -> Option<String> {
        self.uri.query().map(str::to_string)
    }

    fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn dispatcher(&self, path: &str) -> Option<RequestDispatcher> {
        self.mapping.context.as_ref()?.dispatcher(path)
    }
}

fn strip_port(host: &str) -> String {
    let host = host.trim();
    let name = match host.rfind(':') {
        // IPv6 literals keep their brackets; only strip a trailing :port
        Some(idx) if !host[idx..].contains(']') => &host[..idx],
        _ => host,
    };
    name.to_lowercase()
}

/// Percent-decode, then normalize: empty and `.` segments are dropped and
/// `..` removes the previous segment without climbing above the root. A
/// trailing slash survives.
fn decode_path(path: &str) -> String {
    let decoded = match urlencoding::decode(path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => path.to_string(),
    };
    normalize(&decoded)
}

fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let mut out = String::with_capacity(path.len());
    for segment in &segments {
        out.push('/');
        out.push_str(segment);
    }
    let trailing = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");
    if out.is_empty() || trailing {
        out.push('/');
    }
    out
}
