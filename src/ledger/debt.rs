use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::collections::aging::{classify, AgingThresholds};
use crate::decimal::Money;
use crate::invoice::Invoice;
use crate::types::{InvoiceStatus, PaymentId, PaymentMethod, Tier};

/// kind of ledger entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntryKind {
    /// money received against the invoice
    Payment,
    /// negative correction of an earlier payment
    Reversal { reverses: PaymentId, reason: String },
}

/// immutable ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub invoice_number: String,
    /// positive for payments, negative for reversals
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub entry: EntryKind,
}

impl Payment {
    pub fn is_reversal(&self) -> bool {
        matches!(self.entry, EntryKind::Reversal { .. })
    }

    /// id of the payment this entry reverses
    pub fn reverses(&self) -> Option<PaymentId> {
        match &self.entry {
            EntryKind::Reversal { reverses, .. } => Some(*reverses),
            EntryKind::Payment => None,
        }
    }
}

/// live view of an invoice's unpaid balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub invoice: Invoice,
    pub payments: Vec<Payment>,
    /// date the view was computed for
    pub as_of: NaiveDate,
}

impl Debt {
    pub fn new(invoice: Invoice, payments: Vec<Payment>, as_of: NaiveDate) -> Self {
        Self {
            invoice,
            payments,
            as_of,
        }
    }

    /// debts are identified by their invoice number
    pub fn id(&self) -> &str {
        self.invoice.number()
    }

    pub fn total_paid(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn remaining(&self) -> Money {
        let remaining = self.invoice.total() - self.total_paid();
        debug_assert!(!remaining.is_negative(), "ledger allowed overpayment");
        remaining.clamp_non_negative()
    }

    /// whole days past the due date, zero before it
    pub fn days_overdue(&self) -> u32 {
        (self.as_of - self.invoice.due_date()).num_days().max(0) as u32
    }

    pub fn is_settled(&self) -> bool {
        self.remaining().is_zero()
    }

    /// unpaid and past the due date
    pub fn is_past_due(&self) -> bool {
        !self.is_settled() && self.as_of > self.invoice.due_date()
    }

    pub fn status(&self) -> InvoiceStatus {
        let total_paid = self.total_paid();
        if self.is_settled() {
            InvoiceStatus::Paid
        } else if total_paid.is_positive() {
            InvoiceStatus::PartiallyPaid
        } else {
            InvoiceStatus::Unpaid
        }
    }

    /// aging tier; unpaid debts that are not yet past due stay `NotOverdue`
    pub fn tier(&self, thresholds: &AgingThresholds) -> Tier {
        if !self.is_past_due() {
            return Tier::NotOverdue;
        }
        classify(self.days_overdue(), thresholds)
    }

    /// split an intended payment into the part the ledger accepts and the excess
    pub fn split_payment(&self, amount: Money) -> (Money, Money) {
        let remaining = self.remaining();
        if amount <= remaining {
            (amount, Money::ZERO)
        } else {
            (remaining, amount - remaining)
        }
    }

    /// payments that have not been reversed
    pub fn effective_payments(&self) -> Vec<&Payment> {
        let reversed: Vec<PaymentId> = self.payments.iter().filter_map(|p| p.reverses()).collect();
        self.payments
            .iter()
            .filter(|p| !p.is_reversal() && !reversed.contains(&p.id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BillingConfig;
    use crate::fees::FeeScheduleResolver;
    use crate::types::{Child, FeeKind, FeeLineItem, Period};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn invoice(total: i64) -> Invoice {
        let resolver = FeeScheduleResolver::new(&BillingConfig::kindergarten_default());
        let items = vec![FeeLineItem::new("tuition", FeeKind::Monthly, "Tuition", Money::from_major(total))];
        resolver
            .issue(
                "INV-202409-0001".to_string(),
                &Child::new("c-1", "Aziza"),
                Period::new(2024, 9).unwrap(),
                items,
                None,
                Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap(),
            )
            .unwrap()
    }

    fn payment(amount: i64) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            invoice_number: "INV-202409-0001".to_string(),
            amount: Money::from_major(amount),
            method: PaymentMethod::Cash,
            reference: None,
            recorded_at: Utc.with_ymd_and_hms(2024, 9, 5, 0, 0, 0).unwrap(),
            entry: EntryKind::Payment,
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    #[test]
    fn test_status_derivation() {
        let unpaid = Debt::new(invoice(500_000), vec![], date(5));
        assert_eq!(unpaid.status(), InvoiceStatus::Unpaid);

        let partial = Debt::new(invoice(500_000), vec![payment(200_000)], date(5));
        assert_eq!(partial.status(), InvoiceStatus::PartiallyPaid);
        assert_eq!(partial.remaining(), Money::from_major(300_000));

        let paid = Debt::new(invoice(500_000), vec![payment(200_000), payment(300_000)], date(5));
        assert_eq!(paid.status(), InvoiceStatus::Paid);
        assert!(paid.is_settled());
    }

    #[test]
    fn test_days_overdue() {
        let before_due = Debt::new(invoice(500_000), vec![], date(8));
        assert_eq!(before_due.days_overdue(), 0);
        assert!(!before_due.is_past_due());

        let after_due = Debt::new(invoice(500_000), vec![], date(20));
        assert_eq!(after_due.days_overdue(), 10);
        assert!(after_due.is_past_due());
    }

    #[test]
    fn test_tier_from_view() {
        let thresholds = AgingThresholds::kindergarten_default();
        assert_eq!(Debt::new(invoice(500_000), vec![], date(10)).tier(&thresholds), Tier::NotOverdue);
        assert_eq!(Debt::new(invoice(500_000), vec![], date(20)).tier(&thresholds), Tier::Reminder);

        // settled debts never age
        let paid = Debt::new(invoice(500_000), vec![payment(500_000)], date(30));
        assert_eq!(paid.tier(&thresholds), Tier::NotOverdue);
    }

    #[test]
    fn test_split_payment() {
        let debt = Debt::new(invoice(500_000), vec![payment(300_000)], date(5));
        assert_eq!(
            debt.split_payment(Money::from_major(300_000)),
            (Money::from_major(200_000), Money::from_major(100_000))
        );
        assert_eq!(
            debt.split_payment(Money::from_major(50_000)),
            (Money::from_major(50_000), Money::ZERO)
        );
    }

    #[test]
    fn test_reversal_restores_balance() {
        let original = payment(200_000);
        let reversal = Payment {
            id: Uuid::new_v4(),
            amount: Money::from_major(-200_000),
            entry: EntryKind::Reversal {
                reverses: original.id,
                reason: "bounced".to_string(),
            },
            ..original.clone()
        };
        let debt = Debt::new(invoice(500_000), vec![original, reversal], date(5));

        assert_eq!(debt.remaining(), Money::from_major(500_000));
        assert_eq!(debt.status(), InvoiceStatus::Unpaid);
        assert!(debt.effective_payments().is_empty());
    }
}
