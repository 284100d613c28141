use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{BillingError, Result};
use crate::store::BillingStore;
use crate::types::Period;

const PREFIX: &str = "INV";
const MAX_SEQUENCE: u32 = 9999;

/// human-readable invoice identifier, `INV-{YYYYMM}-{NNNN}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InvoiceNumber {
    pub period: Period,
    pub sequence: u32,
}

impl InvoiceNumber {
    pub fn new(period: Period, sequence: u32) -> Result<Self> {
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(BillingError::NumberingConflict {
                period,
                message: format!("sequence {} outside 1..={}", sequence, MAX_SEQUENCE),
            });
        }
        Ok(Self { period, sequence })
    }

    /// parse `INV-202409-0001`
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = s.split('-');
        let (prefix, period, seq) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(period), Some(seq), None) => (p, period, seq),
            _ => {
                return Err(BillingError::InvalidConfiguration {
                    message: format!("'{}' is not an invoice number", s),
                })
            }
        };
        if prefix != PREFIX || seq.len() != 4 || !seq.chars().all(|c| c.is_ascii_digit()) {
            return Err(BillingError::InvalidConfiguration {
                message: format!("'{}' is not an invoice number", s),
            });
        }
        let period = Period::from_code(period)?;
        let sequence = seq.parse::<u32>().map_err(|e| BillingError::InvalidConfiguration {
            message: e.to_string(),
        })?;
        Self::new(period, sequence)
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:04}", PREFIX, self.period.code(), self.sequence)
    }
}

/// issues unique, monotonically increasing invoice numbers per period
///
/// Collisions fail with `NumberingConflict`; nothing is retried or suffixed.
pub struct InvoiceNumbering<S: BillingStore> {
    store: Arc<S>,
    last_issued: Mutex<HashMap<Period, u32>>,
}

impl<S: BillingStore> InvoiceNumbering<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            last_issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn next(&self, period: Period) -> Result<InvoiceNumber> {
        let mut last_issued = self.last_issued.lock();

        let sequence = self.store.reserve_next_invoice_number(period)?;
        let number = InvoiceNumber::new(period, sequence)?;

        if let Some(last) = last_issued.get(&period) {
            if sequence <= *last {
                return Err(BillingError::NumberingConflict {
                    period,
                    message: format!(
                        "store reserved sequence {} but {} was already issued",
                        sequence, last
                    ),
                });
            }
        }

        if self.store.load_invoice(&number.to_string())?.is_some() {
            return Err(BillingError::NumberingConflict {
                period,
                message: format!("{} is already taken", number),
            });
        }

        last_issued.insert(period, sequence);
        log::debug!("reserved invoice number {}", number);
        Ok(number)
    }
}
