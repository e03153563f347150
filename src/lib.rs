//! servok: endpoint-watch distribution engine
//!
//! Resolves named targets into endpoint sets through a pluggable
//! [`Resolver`], suppresses unchanged resolutions, versions every change, and
//! streams full snapshots to subscribers over the `EndpointWatcher` gRPC API.

mod config;
mod endpoint;
mod errors;
mod network;
mod resolver;
mod watch;

pub mod metrics;
pub mod proto;

pub use config::*;
pub use endpoint::*;
pub use errors::*;
pub use network::*;
pub use resolver::*;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
