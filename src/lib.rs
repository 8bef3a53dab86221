#![doc(test(attr(deny(warnings))))]

//! Payline Core keeps a recipient's append-only ledger of payment lines,
//! projects it into a payment timeline, reconciles new decisions into the
//! history, and interprets simulations from the external payment system.

pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        let build = utils::build_info::current();
        tracing::info!(version = build.version, "Payline Core tracing initialized.");
        tracing::debug!(
            hash = build.hash,
            status = build.status,
            target = build.target,
            profile = build.profile,
            built_at = build.timestamp,
            rustc = build.rustc,
            "build metadata"
        );
    });
}
