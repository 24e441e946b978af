//! Shared test utilities for restora integration tests.
//!
//! - `TestHarness`: a session over an in-memory database with fake remotes
//! - `fakes`: scripted history API and in-memory image fetcher
//! - `builders`: raw job records relative to a fixed start time

pub mod builders;
pub mod fakes;
pub mod harness;

pub use builders::*;
pub use fakes::{DeleteMode, MemoryImageFetcher, ScriptedHistory};
pub use harness::TestHarness;
