//! Shared test utilities for skyplate integration tests.
//!
//! - `ScriptedExchange` stands in for the web service and records calls
//! - builders produce the JSON bodies the service answers with

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{client, Reply, ScriptedExchange, BASE_URL};
