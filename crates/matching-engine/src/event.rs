//! Event types and journal for the matching engine
//!
//! Events record every externally visible state change in sequence
//! order, enabling audit and deterministic replay checks.

use common::{Currency, Maturity, OrderId, UnitPrice};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Trade;

/// Event in the matching engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// An order was accepted onto the book (or the pre-open queue)
    OrderAccepted {
        order_id: OrderId,
        currency: Currency,
        maturity: Maturity,
        sequence: u64,
    },

    /// An order was cancelled
    OrderCancelled {
        order_id: OrderId,
        currency: Currency,
        maturity: Maturity,
        sequence: u64,
    },

    /// A trade was executed
    TradeExecuted { trade: Trade, sequence: u64 },

    /// A market opened for continuous trading
    MarketOpened {
        currency: Currency,
        maturity: Maturity,
        opening_unit_price: Option<UnitPrice>,
        sequence: u64,
    },
}

impl EngineEvent {
    /// Get the sequence number for this event
    pub fn sequence(&self) -> u64 {
        match self {
            EngineEvent::OrderAccepted { sequence, .. } => *sequence,
            EngineEvent::OrderCancelled { sequence, .. } => *sequence,
            EngineEvent::TradeExecuted { sequence, .. } => *sequence,
            EngineEvent::MarketOpened { sequence, .. } => *sequence,
        }
    }
}

/// In-memory event journal, append-only in sequence order
#[derive(Debug, Default)]
pub struct EventJournal {
    events: Vec<EngineEvent>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event to the journal
    pub fn append(&mut self, event: EngineEvent) {
        debug!(sequence = event.sequence(), "Event appended to journal");
        self.events.push(event);
    }

    /// Events from a sequence number onwards
    pub fn get_from(&self, from_sequence: u64) -> Vec<EngineEvent> {
        self.events
            .iter()
            .filter(|e| e.sequence() >= from_sequence)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
