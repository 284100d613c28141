pub mod aging;
pub mod delivery;
pub mod escalation;
pub mod reminder;
pub mod scheduler;

pub use aging::{classify, AgingThresholds};
pub use delivery::{DeliveryChannel, DeliveryLog, DeliveryOutcome, DeliveryReport};
pub use escalation::{EscalationState, EscalationTracker, EscalationTransition};
pub use reminder::{ReminderBuilder, ReminderKey, ReminderRequest, ScheduleKey};
pub use scheduler::{CancelOutcome, InMemoryScheduler, ReminderScheduler};
