//! Change notifications published by the engine.
//!
//! The engine owns one [`EventBus`]; presentation code subscribes to it to keep
//! views in step with entry writes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use carnet_shared::types::{ConcilementId, EntryNumber, SettlementNumber};

use crate::fiscal::Boundary;
use crate::ledger::types::EntryStatus;

/// A bulk status operation announced before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOperation {
    /// Validation of ROUGH entries.
    Validate,
    /// Remediation after a boundary edit.
    Remediate(Boundary),
    /// Archiving of closed-period entries.
    Archive,
    /// Migration of FUTURE entries into a new period.
    Migrate,
}

impl fmt::Display for BulkOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::Remediate(boundary) => write!(f, "remediate {boundary}"),
            Self::Archive => write!(f, "archive"),
            Self::Migrate => write!(f, "migrate"),
        }
    }
}

/// A change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// An entry was inserted.
    EntryInserted(EntryNumber),
    /// An entry's fields were updated.
    EntryUpdated(EntryNumber),
    /// An entry changed status.
    StatusChanged {
        /// The entry.
        number: EntryNumber,
        /// Status before.
        previous: EntryStatus,
        /// Status after.
        new: EntryStatus,
    },
    /// A bulk operation is about to touch `count` entries.
    BulkTransition {
        /// The operation.
        operation: BulkOperation,
        /// Number of entries affected.
        count: usize,
    },
    /// An entry's settlement stamp was set or cleared.
    SettlementChanged {
        /// The entry.
        number: EntryNumber,
        /// The new settlement number, `None` when cleared.
        settlement: Option<SettlementNumber>,
    },
    /// An entry's reconciliation linkage was set or cleared.
    ReconciliationChanged {
        /// The entry.
        number: EntryNumber,
        /// The new group, `None` when cleared.
        group: Option<ConcilementId>,
    },
}

type Subscriber = Box<dyn FnMut(&EngineEvent)>;

/// Publish/subscribe channel for [`EngineEvent`]s.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&EngineEvent) + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Delivers `event` to every subscriber, in registration order.
    pub fn publish(&mut self, event: &EngineEvent) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }

    /// Subscribes a recorder that keeps every event.
    pub fn record(&mut self) -> EventLog {
        let log = EventLog::default();
        let sink = Rc::clone(&log.0);
        self.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        log
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Events captured by [`EventBus::record`].
#[derive(Debug, Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<EngineEvent>>>);

impl EventLog {
    /// Copy of the events captured so far.
    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.0.borrow().clone()
    }

    /// Drains the events captured so far.
    pub fn take(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    /// Status changes captured so far.
    #[must_use]
    pub fn status_changes(&self) -> Vec<(EntryNumber, EntryStatus, EntryStatus)> {
        self.0
            .borrow()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::StatusChanged {
                    number,
                    previous,
                    new,
                } => Some((*number, *previous, *new)),
                _ => None,
            })
            .collect()
    }
}
