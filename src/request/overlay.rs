//! Per-dispatch attribute overlay.
//!
//! # Responsibilities
//! - Snapshot the wrapped request's attributes at wrap time
//! - Answer attribute reads from the snapshot only
//! - Keep dispatch attributes (`javax.servlet.include.*` / `forward.*`) local
//! - Propagate every other write/remove to the wrapped request
//! - Optionally shadow the request paths for forward dispatch
//!
//! # Design Decisions
//! - Generic over `AttributeHolder`, so the same overlay wraps the container
//!   `Request`, a `&mut dyn ServletRequest`, or another overlay
//! - One mutex per overlay guards the wrapped request and the map together

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::dispatch::RequestDispatcher;
use crate::request::globals::is_special;
use crate::request::{AttributeHolder, AttributeValue, ServletRequest};

/// Path values reported instead of the wrapped request's own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathOverrides {
    pub request_uri: String,
    pub servlet_path: String,
    pub path_info: Option<String>,
    pub query_string: Option<String>,
}

struct OverlayState<R> {
    wrapped: R,
    attributes: HashMap<String, AttributeValue>,
}

/// Attribute overlay over a wrapped request.
pub struct AttributeOverlay<R> {
    state: Mutex<OverlayState<R>>,
    paths: Option<PathOverrides>,
}

impl<R: AttributeHolder> AttributeOverlay<R> {
    /// Wrap a request, snapshotting its current attributes.
    pub fn new(wrapped: R) -> Self {
        let attributes = snapshot(&wrapped);
        Self {
            state: Mutex::new(OverlayState {
                wrapped,
                attributes,
            }),
            paths: None,
        }
    }

    /// Report `paths` from the path accessors instead of the wrapped request's.
    pub fn with_paths(mut self, paths: PathOverrides) -> Self {
        self.paths = Some(paths);
        self
    }

    fn lock(&self) -> MutexGuard<'_, OverlayState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Option<AttributeValue> {
        self.lock().attributes.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.lock().attributes.keys().cloned().collect()
    }

    pub fn set(&self, name: &str, value: AttributeValue) {
        let mut state = self.lock();
        if !is_special(name) {
            state.wrapped.set_attribute(name, value.clone());
        }
        state.attributes.insert(name.to_string(), value);
    }

    pub fn remove(&self, name: &str) {
        let mut state = self.lock();
        state.attributes.remove(name);
        if !is_special(name) {
            state.wrapped.remove_attribute(name);
        }
    }

    /// Swap the wrapped request and rebuild the snapshot from it.
    ///
    /// Returns the previously wrapped request.
    pub fn rebind(&self, wrapped: R) -> R {
        let mut state = self.lock();
        let previous = std::mem::replace(&mut state.wrapped, wrapped);
        state.attributes = snapshot(&state.wrapped);
        previous
    }

    /// Unwrap, discarding overlay-local state.
    pub fn into_inner(self) -> R {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .wrapped
    }
}

fn snapshot<R: AttributeHolder>(wrapped: &R) -> HashMap<String, AttributeValue> {
    wrapped
        .attribute_names()
        .into_iter()
        .filter_map(|name| wrapped.attribute(&name).map(|value| (name, value)))
        .collect()
}

impl<R: AttributeHolder> AttributeHolder for AttributeOverlay<R> {
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.get(name)
    }

    fn attribute_names(&self) -> Vec<String> {
        self.names()
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) {
        self.set(name, value)
    }

    fn remove_attribute(&mut self, name: &str) {
        self.remove(name)
    }
}

impl<R: ServletRequest> ServletRequest for AttributeOverlay<R> {
    fn method(&self) -> String {
        self.lock().wrapped.method()
    }

    fn request_uri(&self) -> String {
        match &self.paths {
            Some(paths) => paths.request_uri.clone(),
            None => self.lock().wrapped.request_uri(),
        }
    }

    fn context_path(&self) -> String {
        self.lock().wrapped.context_path()
    }

    fn servlet_path(&self) -> String {
        match &self.paths {
            Some(paths) => paths.servlet_path.clone(),
            None => self.lock().wrapped.servlet_path(),
        }
    }

    fn path_info(&self) -> Option<String> {
        match &self.paths {
            Some(paths) => paths.path_info.clone(),
            None => self.lock().wrapped.path_info(),
        }
    }

    fn query_string(&self) -> Option<String> {
        match &self.paths {
            Some(paths) => paths.query_string.clone(),
            None => self.lock().wrapped.query_string(),
        }
    }

    fn header(&self, name: &str) -> Option<String> {
        self.lock().wrapped.header(name)
    }

    fn dispatcher(&self, path: &str) -> Option<RequestDispatcher> {
        self.lock().wrapped.dispatcher(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::globals::{FORWARD_REQUEST_URI, INCLUDE_SERVLET_PATH};
    use crate::request::Request;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn names_of(holder: &impl AttributeHolder) -> BTreeSet<String> {
        holder.attribute_names().into_iter().collect()
    }

    #[test]
    fn test_snapshot_on_wrap() {
        let mut req = Request::get("localhost", "/");
        req.set_attribute("a", Arc::new(1u8));
        let overlay = AttributeOverlay::new(&mut req);
        assert!(overlay.get("a").is_some());
        assert_eq!(overlay.names(), vec!["a".to_string()]);
    }

    #[test]
    fn test_plain_names_propagate() {
        let mut req = Request::get("localhost", "/");
        req.set_attribute("keep", Arc::new(0u8));
        {
            let overlay = AttributeOverlay::new(&mut req);
            overlay.set("x", Arc::new(1u8));
            overlay.set("y", Arc::new(2u8));
            overlay.remove("keep");
            overlay.set("z", Arc::new(3u8));
            overlay.remove("z");
            let expected: BTreeSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
            assert_eq!(names_of(&overlay), expected);
        }
        let expected: BTreeSet<String> = ["x", "y"].iter().map(|s| s.to_string()).collect();
        assert_eq!(names_of(&req), expected);
    }

    #[test]
    fn test_special_names_stay_local() {
        let mut req = Request::get("localhost", "/");
        {
            let overlay = AttributeOverlay::new(&mut req);
            overlay.set(INCLUDE_SERVLET_PATH, Arc::new("/inc".to_string()));
            overlay.set(FORWARD_REQUEST_URI, Arc::new("/orig".to_string()));
            assert!(overlay.get(INCLUDE_SERVLET_PATH).is_some());
            overlay.remove(FORWARD_REQUEST_URI);
            assert!(overlay.get(FORWARD_REQUEST_URI).is_none());
        }
        assert!(req.attribute(INCLUDE_SERVLET_PATH).is_none());
        assert!(req.attribute_names().is_empty());
    }

    #[test]
    fn test_special_remove_does_not_touch_wrapped() {
        let mut req = Request::get("localhost", "/");
        req.set_attribute(INCLUDE_SERVLET_PATH, Arc::new("/outer".to_string()));
        {
            let overlay = AttributeOverlay::new(&mut req);
            overlay.remove(INCLUDE_SERVLET_PATH);
            assert!(overlay.get(INCLUDE_SERVLET_PATH).is_none());
        }
        assert!(req.attribute(INCLUDE_SERVLET_PATH).is_some());
    }

    #[test]
    fn test_rebind_resets_snapshot() {
        let mut first = Request::get("localhost", "/");
        first.set_attribute("from_first", Arc::new(1u8));
        let mut second = Request::get("localhost", "/");
        second.set_attribute("from_second", Arc::new(2u8));

        let overlay = AttributeOverlay::new(Box::new(first));
        overlay.set(INCLUDE_SERVLET_PATH, Arc::new("/inc".to_string()));
        overlay.set("added", Arc::new(3u8));

        let previous = overlay.rebind(Box::new(second));
        assert!(previous.attribute("added").is_some());
        assert_eq!(overlay.names(), vec!["from_second".to_string()]);
    }

    #[test]
    fn test_path_overrides() {
        let mut req = Request::get("localhost", "/app/a?x=1");
        let overlay = AttributeOverlay::new(&mut req).with_paths(PathOverrides {
            request_uri: "/app/b".into(),
            servlet_path: "/b".into(),
            path_info: None,
            query_string: Some("y=2".into()),
        });
        assert_eq!(overlay.request_uri(), "/app/b");
        assert_eq!(overlay.servlet_path(), "/b");
        assert_eq!(overlay.query_string().as_deref(), Some("y=2"));
        assert_eq!(overlay.method(), "GET");
    }

    #[test]
    fn test_shared_across_threads() {
        let overlay = Arc::new(AttributeOverlay::new(Request::get("localhost", "/")));
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                let overlay = overlay.clone();
                std::thread::spawn(move || overlay.set(&format!("k{}", i), Arc::new(i)))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(overlay.names().len(), 4);
    }
}
