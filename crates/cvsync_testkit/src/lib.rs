//! # CVSync Testkit
//!
//! Test utilities for CVSync.
//!
//! This crate provides:
//! - Project fixtures backed by memory or a temporary directory
//! - Property-based test generators using proptest
//! - Fuzz harnesses for the record decoders and the store
//! - A scripted server for reconciliation tests
//! - Stress testing utilities
//! - Entries line test vectors
//!
//! ## Usage
//!
//! ```rust
//! use cvsync_testkit::prelude::*;
//!
//! with_project(|project| {
//!     let file = project.checkout("src/main.c", "1.4");
//!     assert!(project.store.resource_sync(&file).unwrap().is_some());
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod fuzz;
pub mod generators;
pub mod server;
pub mod stress;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::fuzz::*;
    pub use crate::generators::*;
    pub use crate::server::*;
    pub use crate::stress::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use fuzz::*;
pub use generators::*;
pub use server::*;
pub use stress::*;
pub use vectors::*;
