//! Fiscal period management.
//!
//! - Period bounds, counters and ledgers
//! - Initial status placement from effect dates
//! - Status remediation when a boundary moves

pub mod period;
pub mod placement;
pub mod remediation;

#[cfg(test)]
mod remediation_props;

pub use period::{
    FiscalPeriod, Ledger, PeriodBounds, PeriodCounters, PeriodState, PeriodStatus, Placement,
    minimal_effect_date,
};
pub use placement::{Placed, initial_status, placement_status};
pub use remediation::{Boundary, BoundaryChange, BoundaryMove};
