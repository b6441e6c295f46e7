//! A generic, cached, concurrent scanner pipeline for harvesting structured
//! data from Blizzard's World of Warcraft Game Data API: a cache-first
//! dispatcher, an authenticated and rate-limited HTTP client, a persistent
//! response cache, and a validate/repair/filter pipeline, all parameterized
//! over the decoded payload type.

#![forbid(unsafe_code)]
#![warn(
    dead_code,
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    unused_allocation,
    trivial_numeric_casts,
    clippy::single_char_pattern
)]

pub mod client;
pub mod config;
pub mod errors;
pub mod filter;
pub mod rate_limiter;
pub mod regionality;
pub mod repair;
pub mod repairs;
pub mod request;
pub mod scan;
pub mod storage;
pub mod transport;
pub mod validate;
