use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::ledger::debt::{Debt, EntryKind, Payment};
use crate::ledger::locks::KeyedLocks;
use crate::store::BillingStore;
use crate::types::{InvoiceStatus, PaymentId, PaymentMethod};

/// payment request
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub invoice_number: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

impl PaymentRequest {
    pub fn new(invoice_number: impl Into<String>, amount: Money, method: PaymentMethod) -> Self {
        Self {
            invoice_number: invoice_number.into(),
            amount,
            method,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// checks that need no ledger state
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(BillingError::InvalidAmount {
                invoice_number: self.invoice_number.clone(),
                amount: self.amount,
            });
        }

        let has_reference = self
            .reference
            .as_deref()
            .map(|r| !r.trim().is_empty())
            .unwrap_or(false);
        if self.method == PaymentMethod::Transfer && !has_reference {
            return Err(BillingError::MissingReference {
                invoice_number: self.invoice_number.clone(),
                amount: self.amount,
            });
        }

        Ok(())
    }
}

/// accepted payment plus the balance it left behind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    /// net of reversals, including this payment
    pub total_paid: Money,
    pub remaining: Money,
    pub status: InvoiceStatus,
}

/// append-only record of payments against invoices
///
/// Every mutation for one invoice runs under that invoice's lock, so the
/// overpayment check and the append are a single step.
pub struct DebtLedger<S: BillingStore> {
    store: Arc<S>,
    locks: KeyedLocks<String>,
}

impl<S: BillingStore> DebtLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    pub fn record_payment(
        &self,
        request: PaymentRequest,
        recorded_at: DateTime<Utc>,
    ) -> Result<PaymentReceipt> {
        request.validate()?;

        let key = request.invoice_number.clone();
        self.locks.with_lock(&key, || {
            let debt = self.load_debt(&request.invoice_number, recorded_at.date_naive())?;
            let remaining = debt.remaining();
            if request.amount > remaining {
                return Err(BillingError::OverpaymentRejected {
                    invoice_number: request.invoice_number.clone(),
                    remaining,
                    attempted: request.amount,
                });
            }

            let payment = Payment {
                id: Uuid::new_v4(),
                invoice_number: request.invoice_number,
                amount: request.amount,
                method: request.method,
                reference: request.reference,
                recorded_at,
                entry: EntryKind::Payment,
            };
            self.store.append_payment(&payment)?;

            let mut after = debt;
            after.payments.push(payment.clone());
            log::info!(
                "recorded {:?} payment {} on {}, remaining {}",
                payment.method,
                payment.amount,
                payment.invoice_number,
                after.remaining()
            );

            Ok(PaymentReceipt {
                total_paid: after.total_paid(),
                remaining: after.remaining(),
                status: after.status(),
                payment,
            })
        })
    }

    /// append a negative entry cancelling an earlier payment
    pub fn reverse_payment(
        &self,
        invoice_number: &str,
        payment_id: PaymentId,
        reason: &str,
        reversed_at: DateTime<Utc>,
    ) -> Result<Payment> {
        let key = invoice_number.to_string();
        self.locks.with_lock(&key, || {
            let debt = self.load_debt(invoice_number, reversed_at.date_naive())?;

            let original = debt
                .payments
                .iter()
                .find(|p| p.id == payment_id)
                .ok_or_else(|| BillingError::PaymentNotFound {
                    invoice_number: invoice_number.to_string(),
                    payment_id,
                })?;

            if original.is_reversal() {
                return Err(BillingError::InvalidReversal {
                    payment_id,
                    message: "reversal entries cannot be reversed".to_string(),
                });
            }
            if debt.payments.iter().any(|p| p.reverses() == Some(payment_id)) {
                return Err(BillingError::InvalidReversal {
                    payment_id,
                    message: "payment already reversed".to_string(),
                });
            }
            if reason.trim().is_empty() {
                return Err(BillingError::InvalidReversal {
                    payment_id,
                    message: "a reason is required".to_string(),
                });
            }

            let reversal = Payment {
                id: Uuid::new_v4(),
                invoice_number: invoice_number.to_string(),
                amount: -original.amount,
                method: original.method,
                reference: original.reference.clone(),
                recorded_at: reversed_at,
                entry: EntryKind::Reversal {
                    reverses: payment_id,
                    reason: reason.to_string(),
                },
            };
            self.store.append_payment(&reversal)?;

            log::warn!(
                "reversed payment {} on {} ({}): {}",
                payment_id,
                invoice_number,
                original.amount,
                reason
            );
            Ok(reversal)
        })
    }

    /// current balance view of an invoice
    pub fn debt(&self, invoice_number: &str, as_of: NaiveDate) -> Result<Debt> {
        self.load_debt(invoice_number, as_of)
    }

    fn load_debt(&self, invoice_number: &str, as_of: NaiveDate) -> Result<Debt> {
        let invoice = self
            .store
            .load_invoice(invoice_number)?
            .ok_or_else(|| BillingError::InvoiceNotFound {
                invoice_number: invoice_number.to_string(),
            })?;
        let payments = self.store.list_payments_for_invoice(invoice_number)?;
        Ok(Debt::new(invoice, payments, as_of))
    }
}
