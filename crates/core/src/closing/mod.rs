//! Period-closing building blocks: phase ordering and entry synthesis.

pub mod phase;
pub mod solde;

pub use phase::{ClosingPhase, PhaseFlags};
pub use solde::{SoldePlan, balancing_amount, plan_solde};
