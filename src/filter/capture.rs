//! Output capture for unit initialization.
//!
//! Application code writes diagnostic output through [`console`]. While a
//! capture is active on the current thread that output is buffered and, when
//! the capture guard drops, routed to the log under the unit's name instead
//! of the process stdout. Captures nest; the innermost one receives output.

use std::cell::RefCell;
use std::io::{self, Write};

use crate::messages::message;

thread_local! {
    static CAPTURES: RefCell<Vec<Vec<u8>>> = const { RefCell::new(Vec::new()) };
}

/// Active capture on the current thread; released on drop.
#[derive(Debug)]
pub struct CaptureGuard {
    label: String,
    depth: usize,
}

/// Start capturing console output on this thread.
pub fn start(label: &str) -> CaptureGuard {
    let depth = CAPTURES.with(|c| {
        let mut stack = c.borrow_mut();
        stack.push(Vec::new());
        stack.len()
    });
    CaptureGuard {
        label: label.to_string(),
        depth,
    }
}

/// Number of captures active on the current thread.
pub(crate) fn depth() -> usize {
    CAPTURES.with(|c| c.borrow().len())
}

impl CaptureGuard {
    /// Output captured so far.
    pub fn contents(&self) -> String {
        CAPTURES.with(|c| {
            c.borrow()
                .get(self.depth - 1)
                .map(|buf| String::from_utf8_lossy(buf).into_owned())
                .unwrap_or_default()
        })
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let captured = CAPTURES.with(|c| {
            let mut stack = c.borrow_mut();
            // Inner guards leaked by a panic are discarded with this one
            stack.truncate(self.depth);
            stack.pop().unwrap_or_default()
        });
        if !captured.is_empty() {
            let text = String::from_utf8_lossy(&captured);
            tracing::info!(
                target: "valve_engine::capture",
                unit = %self.label,
                "{}",
                message("unit.captured", &[&self.label, &text.trim_end()])
            );
        }
    }
}

/// Console writer honoring the current thread's capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

pub fn console() -> Console {
    Console
}

impl Write for Console {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let captured = CAPTURES.with(|c| match c.borrow_mut().last_mut() {
            Some(top) => {
                top.extend_from_slice(buf);
                true
            }
            None => false,
        });
        if captured {
            Ok(buf.len())
        } else {
            io::stdout().write(buf)
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_collects_console_output() {
        let guard = start("unit");
        write!(console(), "hello ").unwrap();
        writeln!(console(), "world").unwrap();
        assert_eq!(guard.contents(), "hello world\n");
    }

    #[test]
    fn test_nested_captures() {
        let outer = start("outer");
        write!(console(), "a").unwrap();
        {
            let inner = start("inner");
            write!(console(), "b").unwrap();
            assert_eq!(inner.contents(), "b");
        }
        write!(console(), "c").unwrap();
        assert_eq!(outer.contents(), "ac");
    }

    #[test]
    fn test_released_on_drop() {
        {
            let _guard = start("unit");
        }
        CAPTURES.with(|c| assert!(c.borrow().is_empty()));
    }
}
