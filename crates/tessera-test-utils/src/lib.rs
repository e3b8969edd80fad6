//! Shared test utilities for tessera crates.
//!
//! This crate provides:
//! - [`TracingMemoryBackend`]: In-memory storage with operation recording
//! - [`TestContext`]: storage session and execution context wired together
//! - Record batch fixtures
//!
//! # Example
//!
//! ```rust,ignore
//! use tessera_test_utils::{TestContext, sample_batch};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     let value = DatasetValue::from_frame(sample_batch());
//!     // ... encode through ctx.execution_context() ...
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;
pub mod storage;

pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tessera=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
