//! Filesystem persistence for native doc definitions.
//!
//! [`DocStore`] loads and saves the `doc.json` / `schema.json` /
//! `actions.json` triple addressed by a hierarchy key. Multi-blob saves go
//! through a staged, journaled commit so a crash never leaves a mix of old
//! and new blobs visible.

pub mod error;
pub mod journal;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{Blob, DocStore, LoadedDoc, SaveRequest, SaveResult};
