//! Shared types, errors, and configuration for Carnet.
//!
//! This crate provides common types used across all other crates:
//! - Debit/credit pairs and per-currency precision
//! - Typed counters for entries, settlements and concilements
//! - Workspace-wide error taxonomy
//! - Dossier configuration

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
