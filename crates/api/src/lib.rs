//! Native doc files server.
//!
//! Reads and writes the `{doc, schema, actions}` triple of a doc on disk
//! and derives its runtime page config. Exposes config, state, error
//! handling and routes so integration tests and the binary share them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
