//! HTTP and WebSocket adapter over the queuedesk core.

pub mod api;
pub mod metrics;
pub mod state;
