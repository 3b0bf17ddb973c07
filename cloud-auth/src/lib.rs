//! # cloud-auth
//!
//! Credential handling and client lifecycle for the cloud tool handlers:
//! - Credential resolution (per-call overrides merged over stored defaults)
//! - Credential signatures used to detect rotation
//! - Client leases that lazily build and invalidate service clients
//! - HTTP client building with retry middleware
//!
//! ## Architecture
//!
//! Handlers in the `tools` crate own one [`client::ClientLease`] each. Every
//! invocation resolves its credentials, calls `ensure` on the lease, and then
//! reads the handles it needs. `cloud-jobs` reuses the retry policy from
//! [`http`] for its fetcher backoff.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cloud_auth::{
//!     client::{ClientFactory, ClientLease},
//!     credentials::{resolve, CredentialOverrides, StoredCredentials},
//! };
//!
//! let credentials = resolve(&stored, &overrides);
//! lease.ensure(&credentials, &["s3"])?;
//! let s3 = lease.get("s3")?;
//! ```

pub mod client;
pub mod credentials;
pub mod error;
pub mod http;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
