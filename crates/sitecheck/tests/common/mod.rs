//! Shared test utilities for sitecheck integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring the lifecycle and upload pipeline over a temp directory
//! - Builders for job drafts and photo fixtures
//! - `DelayedStore` for forcing concurrent operations to overlap

pub mod builders;
pub mod delayed_store;
pub mod harness;

pub use builders::*;
pub use delayed_store::DelayedStore;
pub use harness::TestHarness;
