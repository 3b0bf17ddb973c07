//! Credential-scoped client lifecycle.

mod factory;
mod lease;

pub use factory::ClientFactory;
pub use lease::ClientLease;
