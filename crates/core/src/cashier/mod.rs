//! Cashier stations and their operational-state interval log.

pub(crate) mod repo;
pub(crate) mod state;
mod types;

pub use types::{Cashier, CashierStatusLog, IntervalChange, IntervalType, OperationalState};
