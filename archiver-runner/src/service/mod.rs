//! Service layer
//!
//! The dispatcher runs the per-container pipeline: resolve the target, check
//! the stall and space gates, fetch an assignment and hand the torrent to a
//! backend. The archive service is reached through the [`AssignmentFetcher`]
//! trait so the pipeline can be tested without a network.

mod dispatcher;
mod fetcher;

pub use dispatcher::{ContainerDispatcher, DispatchOutcome, SkipReason};
pub use fetcher::AssignmentFetcher;
