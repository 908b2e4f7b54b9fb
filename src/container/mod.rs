//! Container tree subsystem.
//!
//! # Data Flow
//! ```text
//! EngineConfig
//!     → deploy.rs (Deployer: build or update the tree)
//!     → engine.rs (Engine: mapper, pause gate, engine pipeline)
//!         → host.rs (Host: contexts by longest path)
//!             → context.rs (Context: filter units, wrappers, listeners, pause gate)
//!                 → wrapper.rs (Wrapper: one handler)
//! ```
//!
//! # Design Decisions
//! - Parents own children through `Arc`; children hold no parent pointers
//! - Child sets are swapped atomically (arc-swap), so mapping never blocks
//! - Each scope owns its pipeline; basic valves resolve the next scope from
//!   the request's mapping data

pub mod context;
pub mod deploy;
pub mod engine;
pub mod host;
pub mod wrapper;

pub use context::{Context, ContextContent, ContextSettings};
pub use deploy::{DeployError, Deployer};
pub use engine::Engine;
pub use host::Host;
pub use wrapper::{ServletDef, Wrapper};
