//! Tool handlers for managed cloud services.
//!
//! Every tool takes a JSON parameter map, resolves credentials for the call,
//! talks to one or more services through a client lease, and returns a
//! [`output::ToolResponse`]. The [`toolbox::Toolbox`] dispatches by tool name.
//!
//! Services are reached through the port traits in [`ports`] plus
//! [`cloud_jobs::traits::storage::ObjectStore`]; [`gateway::ApiClient`] is the
//! HTTP implementation of all of them.

pub mod gateway;
pub mod handlers;
pub mod media;
pub mod output;
pub mod params;
pub mod ports;
pub mod settings;
pub mod toolbox;

pub use cloud_jobs::error::{Error, ErrorKind};
pub use output::{ResultFormat, ToolMessage, ToolResponse};
pub use params::ToolParameters;
pub use settings::ToolSettings;
pub use toolbox::Toolbox;
