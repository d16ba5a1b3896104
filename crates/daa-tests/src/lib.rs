//! # daa-tests
//!
//! Integration tests for daa-consensus.
//!
//! This crate provides:
//! - A chain harness that mines blocks against the retargeting rules
//! - Property-based tests for the codec, ASERT and the anchor resolver
//! - End-to-end retargeting scenarios across upgrade stages
//! - Anchor resolution under reorgs and concurrent use
//! - Chain parameter loading from TOML

pub mod generators;
pub mod harness;





pub use generators::*;
pub use harness::*;
