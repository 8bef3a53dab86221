//! Build metadata stamped in by `build.rs`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub hash: &'static str,
    pub status: &'static str,
    pub timestamp: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc: &'static str,
}

pub fn current() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        hash: option_env!("PAYLINE_CORE_BUILD_HASH").unwrap_or("unknown"),
        status: option_env!("PAYLINE_CORE_BUILD_STATUS").unwrap_or("unknown"),
        timestamp: option_env!("PAYLINE_CORE_BUILD_TIMESTAMP").unwrap_or("unknown"),
        target: option_env!("PAYLINE_CORE_BUILD_TARGET").unwrap_or("unknown"),
        profile: option_env!("PAYLINE_CORE_BUILD_PROFILE").unwrap_or("unknown"),
        rustc: option_env!("PAYLINE_CORE_BUILD_RUSTC").unwrap_or("unknown"),
    }
}
