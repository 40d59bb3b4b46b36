//! Core business logic for Carnet.
//!
//! This crate contains pure bookkeeping rules with ZERO storage dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `ledger` - Entries, accounts and balance aggregates
//! - `fiscal` - Fiscal period bounds, status placement and remediation
//! - `workflow` - Entry status transitions
//! - `reconcile` - Concilement groups and settlement errors
//! - `closing` - Closing phases and solde synthesis
//! - `interchange` - CSV row shape
//! - `events` - Change notifications

pub mod closing;
pub mod events;
pub mod fiscal;
pub mod interchange;
pub mod ledger;
pub mod reconcile;
pub mod workflow;
