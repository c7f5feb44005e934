use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ClientId, InstallmentId, OrderId, SellerId};

/// all events emitted by the sales operations core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // assignment events
    SellerAssigned {
        client_id: ClientId,
        seller_id: SellerId,
        seller_load: u32,
        over_capacity: bool,
        timestamp: DateTime<Utc>,
    },
    AssignmentReused {
        client_id: ClientId,
        seller_id: SellerId,
        timestamp: DateTime<Utc>,
    },
    AssignmentReleased {
        client_id: ClientId,
        seller_id: SellerId,
        seller_load: u32,
        timestamp: DateTime<Utc>,
    },

    // ledger events
    SchedulePersisted {
        order_id: OrderId,
        client_id: ClientId,
        installments: u32,
        total_amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentRecorded {
        installment_id: InstallmentId,
        order_id: OrderId,
        applied: Money,
        excess: Money,
        paid_amount: Money,
        value_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    InstallmentSettled {
        installment_id: InstallmentId,
        order_id: OrderId,
        number: u32,
        paid_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },

    // collaborator events
    AlertDispatchFailed {
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
