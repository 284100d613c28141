use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ChildId, PaymentId, PaymentMethod, Period, Tier};

/// all events that can be emitted by the billing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // invoice events
    InvoiceIssued {
        invoice_number: String,
        child_id: ChildId,
        period: Period,
        total: Money,
        due_date: NaiveDate,
        timestamp: DateTime<Utc>,
    },
    InvoiceSettled {
        invoice_number: String,
        total_paid: Money,
        timestamp: DateTime<Utc>,
    },

    // ledger events
    PaymentRecorded {
        invoice_number: String,
        payment_id: PaymentId,
        amount: Money,
        method: PaymentMethod,
        remaining: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentRejected {
        invoice_number: String,
        amount: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    PaymentReversed {
        invoice_number: String,
        payment_id: PaymentId,
        reversal_id: PaymentId,
        amount: Money,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // collections events
    EscalationAdvanced {
        invoice_number: String,
        from: Tier,
        to: Tier,
        days_overdue: u32,
        timestamp: DateTime<Utc>,
    },
    EscalationResolved {
        invoice_number: String,
        timestamp: DateTime<Utc>,
    },
    ReminderBuilt {
        invoice_number: String,
        tier: Tier,
        timestamp: DateTime<Utc>,
    },
    ReminderScheduled {
        invoice_number: String,
        tier: Tier,
        scheduled_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    ReminderCancelled {
        invoice_number: String,
        tier: Tier,
        scheduled_at: DateTime<Utc>,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },
    DeliveryReported {
        invoice_number: String,
        tier: Tier,
        delivered: bool,
        reason: Option<String>,
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
        Self { events: Vec::new() }
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
