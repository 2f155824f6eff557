//! # cvsync remote tree reconciliation
//!
//! Builds the remote tree of a project subtree from one delta exchange with
//! a CVS server.
//!
//! This crate provides:
//! - The [`DeltaSource`] seam the protocol layer implements
//! - [`RemoteTreeBuilder`], which merges local base metadata with deltas
//! - [`build_base_tree`], the base revisions recorded locally
//! - [`MockDeltaSource`], a scripted source for tests
//!
//! ## Algorithm
//!
//! 1. Ask the server for differences under the root, retrying once without
//!    the tag if the tag is unknown there
//! 2. Start every folder from the local base and apply the deltas
//! 3. Fetch the contents of folders the client does not have
//! 4. Fetch revisions of new or changed files in batches
//!
//! ## Key Invariants
//!
//! - A deletion delta is never replaced by another delta for the same path
//! - A conflict state is never downgraded
//! - Server errors are tolerated once the exchange discovered something

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod error;
mod transport;

pub use builder::{build_base_tree, RemoteTreeBuilder};
pub use config::ReconcileConfig;
pub use error::{ReconcileError, ReconcileResult};
pub use transport::{
    DeltaEvent, DeltaListener, DeltaRequest, DeltaScript, DeltaSource, MockDeltaSource,
    RevisionRequest, StatusListener,
};
