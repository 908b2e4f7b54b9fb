//! User-facing message catalog.
//!
//! Messages are looked up by symbolic key and formatted with positional
//! arguments (`{0}`, `{1}`, ...). Unknown keys format as the key itself so a
//! missing entry never hides the underlying condition.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::OnceLock;

const CATALOG: &[(&str, &str)] = &[
    ("engine.noHost", "No host matches server name {0}"),
    ("host.noContext", "No context is configured to process this request"),
    ("context.notFound", "The requested resource ({0}) is not available"),
    ("context.listenerInit", "Request-initialized listener {0} failed: {1}"),
    ("context.listenerDestroy", "Request-destroyed listener {0} failed: {1}"),
    ("context.stopped", "Context {0} has been stopped and is not accepting requests"),
    ("wrapper.forbidden", "Access to the requested resource ({0}) is forbidden"),
    ("wrapper.unavailable", "Servlet {0} is currently unavailable"),
    ("wrapper.serviceError", "Servlet {0} raised an error: {1}"),
    ("wrapper.filterError", "Filter chain for servlet {0} raised an error: {1}"),
    ("unit.destroyFailed", "Destroy of {0} failed: {1}"),
    ("unit.captured", "Output captured while initializing {0}: {1}"),
    ("native.unavailable", "Native acceleration library not found; using portable code paths"),
    ("native.incompatible", "Native acceleration library {0} is older than required {1}"),
    ("native.loaded", "Native acceleration library {0} loaded"),
];

/// Keyed message formatter.
pub struct StringManager {
    messages: HashMap<&'static str, &'static str>,
}

impl StringManager {
    /// The process-wide catalog.
    pub fn global() -> &'static StringManager {
        static MANAGER: OnceLock<StringManager> = OnceLock::new();
        MANAGER.get_or_init(|| StringManager {
            messages: CATALOG.iter().copied().collect(),
        })
    }

    pub fn get(&self, key: &str, args: &[&dyn Display]) -> String {
        let template = match self.messages.get(key) {
            Some(t) => *t,
            None => return key.to_string(),
        };
        format_positional(template, args)
    }
}

/// Substitute `{N}` placeholders in one pass. Argument text is never
/// rescanned; placeholders without a matching argument stay literal.
fn format_positional(template: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        let arg = (digits > 0 && after.as_bytes().get(digits) == Some(&b'}'))
            .then(|| after[..digits].parse::<usize>().ok())
            .flatten()
            .and_then(|i| args.get(i));
        match arg {
            Some(arg) => {
                out.push_str(&arg.to_string());
                rest = &after[digits + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Shorthand for `StringManager::global().get(..)`.
pub fn message(key: &str, args: &[&dyn Display]) -> String {
    StringManager::global().get(key, args)
}
