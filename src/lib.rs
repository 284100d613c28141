pub mod collections;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod fees;
pub mod invoice;
pub mod ledger;
pub mod numbering;
pub mod store;
pub mod types;
pub mod views;

// re-export key types
pub use collections::{
    classify, AgingThresholds, CancelOutcome, DeliveryChannel, DeliveryLog, DeliveryOutcome,
    DeliveryReport, EscalationState, EscalationTracker, EscalationTransition, InMemoryScheduler,
    ReminderBuilder, ReminderKey, ReminderRequest, ReminderScheduler, ScheduleKey,
};
pub use config::{AttendanceConfig, BillingConfig, PaymentTerms, ReminderConfig, ReminderTemplate};
pub use decimal::{Money, Rate};
pub use engine::BillingEngine;
pub use errors::{BillingError, ErrorKind, Result};
pub use events::{Event, EventStore};
pub use fees::{AttendanceCalculator, AttendanceDeduction, FeeScheduleResolver};
pub use invoice::{Invoice, PriceBreakdown};
pub use ledger::{Debt, DebtLedger, EntryKind, Payment, PaymentReceipt, PaymentRequest};
pub use numbering::{InvoiceNumber, InvoiceNumbering};
pub use store::{BillingStore, InMemoryStore};
pub use types::{
    AttendanceRecord, Child, ChildId, FeeKind, FeeLineItem, InvoiceStatus, Locale, PaymentId,
    PaymentMethod, Period, RepeatPolicy, Tier,
};
pub use views::{ChildBalance, DebtView, InvoiceView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
