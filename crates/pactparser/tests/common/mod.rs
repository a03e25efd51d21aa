//! Shared test utilities for pactparser integration tests.
//!
//! - `TestHarness`: temp directories, a file-backed job store and the
//!   wiring between pipeline, worker pool and contract service
//! - builders for extraction replies and scripted collaborators

pub mod builders;
pub mod harness;

#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use harness::TestHarness;
