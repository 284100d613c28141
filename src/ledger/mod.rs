pub mod debt;
pub mod locks;
pub mod recorder;

pub use debt::{Debt, EntryKind, Payment};
pub use locks::KeyedLocks;
pub use recorder::{DebtLedger, PaymentReceipt, PaymentRequest};
