//! Queue orchestration: the operations exposed to adapters.
//!
//! [`QueueOrchestrator`] runs every state change as one write transaction on
//! the shared store and publishes events only after the commit.

mod engine;
mod transfer;
mod types;

pub use engine::QueueOrchestrator;
pub use types::{TransferResult, TransitionRequest};
