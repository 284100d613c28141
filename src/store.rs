use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;

use crate::errors::{BillingError, Result};
use crate::invoice::Invoice;
use crate::ledger::Payment;
use crate::types::Period;

/// persistence collaborator
///
/// Every call is treated as atomic and durable. `save_invoice` must refuse
/// to overwrite an existing number; the engine relies on it to surface
/// numbering conflicts.
pub trait BillingStore: Send + Sync {
    fn load_invoice(&self, number: &str) -> Result<Option<Invoice>>;

    /// invoice already issued for a child in a period, if any
    fn find_invoice(&self, child_id: &str, period: Period) -> Result<Option<Invoice>>;

    fn save_invoice(&self, invoice: &Invoice) -> Result<()>;

    fn append_payment(&self, payment: &Payment) -> Result<()>;

    fn list_payments_for_invoice(&self, number: &str) -> Result<Vec<Payment>>;

    /// next sequence number for the period, starting at 1
    fn reserve_next_invoice_number(&self, period: Period) -> Result<u32>;

    fn list_invoices_for_child(&self, child_id: &str) -> Result<Vec<Invoice>>;

    fn list_invoices(&self) -> Result<Vec<Invoice>>;
}

/// in-memory store for tests, demos and single-process hosts
#[derive(Debug, Default)]
pub struct InMemoryStore {
    invoices: RwLock<HashMap<String, Invoice>>,
    payments: RwLock<HashMap<String, Vec<Payment>>>,
    sequences: Mutex<HashMap<Period, u32>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoice_count(&self) -> usize {
        self.invoices.read().len()
    }
}

impl BillingStore for InMemoryStore {
    fn load_invoice(&self, number: &str) -> Result<Option<Invoice>> {
        Ok(self.invoices.read().get(number).cloned())
    }

    fn find_invoice(&self, child_id: &str, period: Period) -> Result<Option<Invoice>> {
        Ok(self
            .invoices
            .read()
            .values()
            .find(|i| i.child_id() == child_id && i.period() == period)
            .cloned())
    }

    fn save_invoice(&self, invoice: &Invoice) -> Result<()> {
        let mut invoices = self.invoices.write();
        if invoices.contains_key(invoice.number()) {
            return Err(BillingError::NumberingConflict {
                period: invoice.period(),
                message: format!("invoice {} already exists", invoice.number()),
            });
        }
        invoices.insert(invoice.number().to_string(), invoice.clone());
        Ok(())
    }

    fn append_payment(&self, payment: &Payment) -> Result<()> {
        if !self.invoices.read().contains_key(&payment.invoice_number) {
            return Err(BillingError::InvoiceNotFound {
                invoice_number: payment.invoice_number.clone(),
            });
        }
        self.payments
            .write()
            .entry(payment.invoice_number.clone())
            .or_default()
            .push(payment.clone());
        Ok(())
    }

    fn list_payments_for_invoice(&self, number: &str) -> Result<Vec<Payment>> {
        Ok(self.payments.read().get(number).cloned().unwrap_or_default())
    }

    fn reserve_next_invoice_number(&self, period: Period) -> Result<u32> {
        let mut sequences = self.sequences.lock();
        let next = sequences.entry(period).or_insert(0);
        *next += 1;
        Ok(*next)
    }

    fn list_invoices_for_child(&self, child_id: &str) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .read()
            .values()
            .filter(|i| i.child_id() == child_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.period());
        Ok(invoices)
    }

    fn list_invoices(&self) -> Result<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self.invoices.read().values().cloned().collect();
        invoices.sort_by(|a, b| a.number().cmp(b.number()));
        Ok(invoices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequences_are_per_period() {
        let store = InMemoryStore::new();
        let sep = Period::new(2024, 9).unwrap();
        let oct = Period::new(2024, 10).unwrap();

        assert_eq!(store.reserve_next_invoice_number(sep).unwrap(), 1);
        assert_eq!(store.reserve_next_invoice_number(sep).unwrap(), 2);
        assert_eq!(store.reserve_next_invoice_number(oct).unwrap(), 1);
    }

    #[test]
    fn test_missing_invoice_lists_no_payments() {
        let store = InMemoryStore::new();
        assert!(store.list_payments_for_invoice("INV-202409-0001").unwrap().is_empty());
        assert!(store.load_invoice("INV-202409-0001").unwrap().is_none());
    }
}
