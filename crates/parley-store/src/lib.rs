//! # parley-store
//!
//! Persistence of the local package list. Each package is kept as one file
//! holding its local tag document, so the on-disk form is the same format
//! peers exchange, only with filesystem paths and secrets retained.

pub mod packages;
pub mod store;

mod error;

pub use error::{Result, StoreError};
pub use store::PackageStore;
