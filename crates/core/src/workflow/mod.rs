//! Entry lifecycle state machine.
//!
//! # Modules
//!
//! - `service` - Status transition rules

pub mod service;

#[cfg(test)]
mod service_props;

pub use service::EntryTransitions;
