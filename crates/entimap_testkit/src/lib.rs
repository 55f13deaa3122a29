//! # entimap Testkit
//!
//! Test utilities for entimap.
//!
//! This crate provides:
//! - Fixture models and datasets over a fault-injecting in-memory store
//! - Property-based test generators using proptest
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use entimap_testkit::prelude::*;
//!
//! #[test]
//! fn saves_a_user() {
//!     init_tracing();
//!     let ds = TestDataset::new();
//!     let mut user = user("Alice", 30);
//!     assert!(ds.save(&mut user, None).unwrap());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
    pub use entimap_core::{
        Dataset, Key, KeyId, Model, ModelExt, QueryOptions, RetryPolicy, Value,
    };
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
