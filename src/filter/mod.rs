//! Filter (interceptor unit) subsystem.
//!
//! # Data Flow
//! ```text
//! FilterDef (config/deploy)
//!     → unit.rs (FilterUnit: lazy instantiate + init, release, replace)
//!         → loader.rs (two-tier class resolution)
//!         → capture.rs (console capture during init)
//!         → executor.rs (direct or privileged destroy)
//!     → chain.rs (FilterChain built per dispatch from FilterMaps)
//! ```
//!
//! # Design Decisions
//! - Instances are shared across concurrent requests; filters handle their own state
//! - Filters see their configuration through `UnitConfig`, never the context itself

pub mod capture;
pub mod chain;
pub mod executor;
pub mod loader;
pub mod types;
pub mod unit;

use crate::facade::UnitConfig;
use crate::request::ServletRequest;
use crate::response::ServletResponse;
use crate::servlet::ServletError;

pub use chain::FilterChain;
pub use types::{DispatcherType, FilterDef, FilterMap, UnitError};
pub use unit::{FilterUnit, ScopeServices};

/// A pluggable interceptor around a handler.
pub trait Filter: Send + Sync {
    fn init(&mut self, _config: &dyn UnitConfig) -> Result<(), ServletError> {
        Ok(())
    }

    fn do_filter(
        &self,
        request: &mut dyn ServletRequest,
        response: &mut dyn ServletResponse,
        chain: &mut FilterChain<'_>,
    ) -> Result<(), ServletError>;

    fn destroy(&self) -> Result<(), ServletError> {
        Ok(())
    }
}
