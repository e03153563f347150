//! Endpoint watch engine
//!
//! Keeps one registration per watched target, polls the configured
//! [`Resolver`](crate::Resolver) for it, and fans every accepted change out
//! to the target's subscribers.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌──────────────┐
//! │   Resolver   │ (static / DNS)
//! └──────┬───────┘
//!        │ resolve() [bounded by resolve_timeout]
//!        ▼
//! ┌──────────────┐
//! │  Poll Loop   │ (one tokio task per target)
//! └──────┬───────┘
//!        │ diff() → Some(next version)
//!        ▼
//! ┌──────────────┐
//! │   Registry   │ (DashMap<target, registration>)
//! └──────┬───────┘
//!        │ push() [never blocks]
//!        ▼
//! ┌──────────────┐
//! │ Per-Session  │ (bounded, disconnect or coalesce on overflow)
//! │ Queues       │
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │ gRPC Stream  │
//! └──────────────┘
//! ```
//!
//! # Usage Example
//!
//! ```ignore
//! let resolver = build_resolver(&config.resolver);
//! let registry = TargetRegistry::new(resolver, config.watch, config.retry, 0);
//!
//! let mut session = registry.attach("payments")?;
//! while let Some(item) = session.recv().await {
//!     let snapshot = item?;
//!     println!("{snapshot}");
//! }
//! ```

mod diff;
mod poller;
mod registry;
mod session;

pub use diff::*;
pub use registry::TargetPhase;
pub use registry::TargetRegistry;
pub use session::SubscriberSession;

#[cfg(test)]
mod diff_test;
