//! This module is the network layer exposing the watch engine over gRPC
pub mod grpc;

pub use grpc::start_rpc_server;
pub use grpc::start_rpc_server_with_listener;
pub use grpc::WatchService;
