//! Large-flow detection: bounded-memory algorithms that flag flows exceeding
//! a configured rate envelope from a stream of `(flow_id, size, ts)` packet
//! observations.
//!
//! This crate is the pure detection core: no trace ingestion, no config
//! parsing, no evaluation harness. Those live in `lfd-cli`. `spec.md` §2
//! draws this boundary explicitly — everything here is a synchronous,
//! single-threaded state machine with no I/O.

#![forbid(unsafe_code)]

pub mod baseline;
pub mod blacklist;
pub mod clef;
pub mod eardet;
pub mod error;
pub mod hash;
pub mod params;
pub mod rlfd;
pub mod sliding_window;
pub mod types;

pub use baseline::BaselineDetector;
pub use blacklist::Blacklist;
pub use clef::{CLEFDetector, CLEFStats, SubDetector};
pub use eardet::EARDetector;
pub use error::{DetectorError, Result};
pub use hash::{AesFlowHash, DecorrelatingFlowHash, FlowHash, Murmur3FlowHash};
pub use params::{derive, DerivedConfig, FlowSpecParams};
pub use rlfd::RLFDetector;
pub use sliding_window::SlidingWindowDetector;
pub use types::{FlowId, FlowKey, Nanos};
