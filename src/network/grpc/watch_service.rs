//! `EndpointWatcher` service: one subscriber session per `Watch` call
//!
//! ```text
//! WatchRequest → TargetRegistry::attach → SubscriberSession → WatchResponse stream
//! ```
//!
//! The gRPC stream owns the session, so a client disconnect drops the stream
//! and detaches the session.

use std::pin::Pin;

use futures::Stream;
use futures::StreamExt;
use tonic::Request;
use tonic::Response;
use tonic::Status;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::proto::exts::Validate;
use crate::proto::v1::WatchRequest;
use crate::proto::v1::WatchResponse;
use crate::proto::EndpointWatcher;
use crate::TargetRegistry;

#[derive(Debug, Clone)]
pub struct WatchService {
    registry: TargetRegistry,
}

impl WatchService {
    pub fn new(registry: TargetRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }
}

#[tonic::async_trait]
impl EndpointWatcher for WatchService {
    type WatchStream = Pin<Box<dyn Stream<Item = Result<WatchResponse, Status>> + Send>>;

    /// Streams full endpoint snapshots of the requested target.
    ///
    /// The first message is the target's current snapshot, possibly empty.
    /// A terminal session error ends the stream with the matching status.
    async fn watch(
        &self,
        request: Request<WatchRequest>,
    ) -> std::result::Result<Response<Self::WatchStream>, Status> {
        let remote_addr = request.remote_addr();
        let request = request.into_inner();
        request.validate()?;
        let target = request.target;

        let session = self.registry.attach(&target).map_err(|e| {
            warn!(target = %target, ?remote_addr, error = %e, "Watch rejected");
            Status::from(e)
        })?;

        info!(
            target = %target,
            session_id = %session.id(),
            ?remote_addr,
            "Watch stream opened"
        );

        let session_id = session.id().to_string();
        let stream = session.into_stream().map(move |item| match item {
            Ok(snapshot) => {
                debug!(
                    session_id = %session_id,
                    version = snapshot.version(),
                    endpoints = snapshot.len(),
                    "Sending snapshot"
                );
                Ok(WatchResponse::from(snapshot.as_ref()))
            }
            Err(e) => {
                info!(session_id = %session_id, error = %e, "Watch stream terminated");
                Err(Status::from(e))
            }
        });

        Ok(Response::new(Box::pin(stream)))
    }
}
