//! Optional native acceleration library detection.
//!
//! The library is never required. Its presence is probed once per process:
//! the version it reports is compared against a floor, the outcome is logged,
//! and nothing else in the engine changes behavior.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::messages::message;

/// Environment variable through which the installed library reports its version.
pub const NATIVE_VERSION_ENV: &str = "VALVE_NATIVE_VERSION";

/// Oldest library version the engine will use.
pub const REQUIRED_VERSION: Version = Version::new(1, 2, 14);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('.');
        let mut next = |what: &str| -> Result<u32, String> {
            parts
                .next()
                .unwrap_or("0")
                .parse()
                .map_err(|_| format!("invalid {} component in version '{}'", what, s))
        };
        let version = Version::new(next("major")?, next("minor")?, next("patch")?);
        if parts.next().is_some() {
            return Err(format!("too many components in version '{}'", s));
        }
        Ok(version)
    }
}

/// Outcome of the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeStatus {
    Unavailable,
    Incompatible { found: Version, required: Version },
    Available(Version),
}

impl NativeStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, NativeStatus::Available(_))
    }
}

/// Classify a reported version string.
pub fn evaluate(reported: Option<&str>) -> NativeStatus {
    let Some(reported) = reported else {
        return NativeStatus::Unavailable;
    };
    match reported.parse::<Version>() {
        Ok(found) if found >= REQUIRED_VERSION => NativeStatus::Available(found),
        Ok(found) => NativeStatus::Incompatible {
            found,
            required: REQUIRED_VERSION,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unparsable native library version");
            NativeStatus::Unavailable
        }
    }
}

fn probe() -> Option<String> {
    std::env::var(NATIVE_VERSION_ENV).ok()
}

/// Probe once per process and log the outcome. With `enabled == false` the
/// probe is skipped and the library counts as unavailable.
pub fn status(enabled: bool) -> &'static NativeStatus {
    static STATUS: OnceLock<NativeStatus> = OnceLock::new();
    STATUS.get_or_init(|| {
        let status = if enabled {
            evaluate(probe().as_deref())
        } else {
            NativeStatus::Unavailable
        };
        match &status {
            NativeStatus::Unavailable => tracing::info!("{}", message("native.unavailable", &[])),
            NativeStatus::Incompatible { found, required } => {
                tracing::warn!("{}", message("native.incompatible", &[found, required]))
            }
            NativeStatus::Available(version) => {
                tracing::info!("{}", message("native.loaded", &[version]))
            }
        }
        status
    })
}
