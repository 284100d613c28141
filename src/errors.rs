use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{ChildId, Locale, Period, Tier};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillingError {
    #[error("invalid fee configuration: {message}")]
    InvalidFeeConfiguration {
        message: String,
    },

    #[error("invoice {existing_number} already issued for child {child_id} in period {period}")]
    DuplicateInvoicePeriod {
        child_id: ChildId,
        period: Period,
        existing_number: String,
    },

    #[error("invalid payment amount for invoice {invoice_number}: {amount} must be greater than zero")]
    InvalidAmount {
        invoice_number: String,
        amount: Money,
    },

    #[error("transfer payment of {amount} for invoice {invoice_number} requires a reference")]
    MissingReference {
        invoice_number: String,
        amount: Money,
    },

    #[error("overpayment rejected for invoice {invoice_number}: remaining is {remaining} but payment is {attempted}")]
    OverpaymentRejected {
        invoice_number: String,
        remaining: Money,
        attempted: Money,
    },

    #[error("invoice numbering conflict in period {period}: {message}")]
    NumberingConflict {
        period: Period,
        message: String,
    },

    #[error("invoice not found: {invoice_number}")]
    InvoiceNotFound {
        invoice_number: String,
    },

    #[error("payment {payment_id} not found on invoice {invoice_number}")]
    PaymentNotFound {
        invoice_number: String,
        payment_id: Uuid,
    },

    #[error("invalid reversal of payment {payment_id}: {message}")]
    InvalidReversal {
        payment_id: Uuid,
        message: String,
    },

    #[error("invalid attendance: present days {present_days} exceed working days {working_days}")]
    InvalidAttendance {
        working_days: u32,
        present_days: u32,
    },

    #[error("invalid period: {message}")]
    InvalidPeriod {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("no reminder template text for tier {tier} in locale {locale}")]
    MissingTemplate {
        tier: Tier,
        locale: Locale,
    },

    #[error("reminders are suppressed for invoice {invoice_number} at tier {tier}")]
    ReminderSuppressed {
        invoice_number: String,
        tier: Tier,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },
}

/// stable machine-readable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    InvalidFeeConfiguration,
    DuplicateInvoicePeriod,
    InvalidAmount,
    MissingReference,
    OverpaymentRejected,
    NumberingConflict,
    NotFound,
    InvalidInput,
    Configuration,
    Storage,
}

impl BillingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::InvalidFeeConfiguration { .. } => ErrorKind::InvalidFeeConfiguration,
            BillingError::DuplicateInvoicePeriod { .. } => ErrorKind::DuplicateInvoicePeriod,
            BillingError::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            BillingError::MissingReference { .. } => ErrorKind::MissingReference,
            BillingError::OverpaymentRejected { .. } => ErrorKind::OverpaymentRejected,
            BillingError::NumberingConflict { .. } => ErrorKind::NumberingConflict,
            BillingError::InvoiceNotFound { .. } | BillingError::PaymentNotFound { .. } => {
                ErrorKind::NotFound
            }
            BillingError::InvalidReversal { .. }
            | BillingError::InvalidAttendance { .. }
            | BillingError::InvalidPeriod { .. }
            | BillingError::ReminderSuppressed { .. } => ErrorKind::InvalidInput,
            BillingError::InvalidConfiguration { .. } | BillingError::MissingTemplate { .. } => {
                ErrorKind::Configuration
            }
            BillingError::Storage { .. } => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
