//! Storefront core: translation lookup and client event telemetry.
//!
//! - [`i18n`]: nested-key translation resolution over the built-in fr/en/ko
//!   dictionary, with a consistency validator
//! - [`telemetry`]: batching event pipeline with injected transport, storage,
//!   clock, randomness and environment
//! - [`performance`]: fire-and-forget metric beacons with Web Vitals ratings
//! - [`collector`]: development HTTP service that receives both

pub mod collector;
pub mod config;
pub mod i18n;
pub mod performance;
pub mod retry;
pub mod security;
pub mod telemetry;
