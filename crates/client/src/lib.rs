//! HTTP client for the platform backend.
//!
//! Fetches the hierarchy catalogs (concurrently, tolerating partial
//! failure), reads and writes records, runs runtime actions and talks to
//! the native doc files server. All HTTP goes through the [`Transport`]
//! trait so sessions can be tested without a network.

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::{NativeDocPayload, NativeFilesUpdate, PlatformClient};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use executor::ActionExecutor;
pub use transport::{HttpTransport, Transport, TransportRequest, TransportResponse};
