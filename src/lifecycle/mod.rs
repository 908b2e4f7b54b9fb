//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging → Probe native library → Deploy engine → Start listener
//!
//! Reload (config/watcher.rs → container/engine.rs):
//!     File change → Load + validate → Pause context → Drain → Swap units → Resume
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Release filter units → Exit
//! ```
//!
//! # Design Decisions
//! - Pausing is per context; other contexts keep serving during a reload
//! - Held requests wait on a condition variable (pause.rs), no timeout

pub mod pause;
pub mod shutdown;

pub use pause::{InFlight, PauseGate, Paused};
pub use shutdown::Shutdown;
