//! Protocol Buffer definitions and generated code for the Watch API.
//!
//! Types are generated by [`tonic-build`] from `proto/servok/api/v1/v1.proto`
//! at build time.

pub mod v1 {
    tonic::include_proto!("servok.api.v1");
}

pub mod exts;


pub use v1::endpoint_watcher_client::EndpointWatcherClient;
pub use v1::endpoint_watcher_server::EndpointWatcher;
pub use v1::endpoint_watcher_server::EndpointWatcherServer;
