//! HTTP client building with middleware.

mod client;
mod retry;
mod signer;

pub use client::{HttpClientBuilder, HttpClientConfig, MiddlewareClient};
pub use retry::RetryAfterPolicy;
pub use signer::RequestSigner;
