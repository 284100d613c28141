/// serialization support for invoices and balances
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::collections::aging::AgingThresholds;
use crate::decimal::Money;
use crate::invoice::Invoice;
use crate::ledger::Debt;
use crate::types::{ChildId, FeeLineItem, InvoiceStatus, PaymentId, PaymentMethod, Period, Tier};

/// serializable view of an issued invoice
#[derive(Debug, Serialize, Deserialize)]
pub struct InvoiceView {
    pub number: String,
    pub child_id: ChildId,
    pub child_name: String,
    pub period: Period,
    pub issued_at: DateTime<Utc>,
    pub due_date: NaiveDate,
    pub line_items: Vec<FeeLineItem>,
    pub amounts: AmountsView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AmountsView {
    pub subtotal: Money,
    pub discount_total: Money,
    pub attendance_deduction: Money,
    pub total: Money,
}

impl InvoiceView {
    pub fn from_invoice(invoice: &Invoice) -> Self {
        InvoiceView {
            number: invoice.number().to_string(),
            child_id: invoice.child_id().to_string(),
            child_name: invoice.child_name().to_string(),
            period: invoice.period(),
            issued_at: invoice.issued_at(),
            due_date: invoice.due_date(),
            line_items: invoice.line_items().to_vec(),
            amounts: AmountsView {
                subtotal: invoice.subtotal(),
                discount_total: invoice.discount_total(),
                attendance_deduction: invoice.attendance_deduction(),
                total: invoice.total(),
            },
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerEntryView {
    pub id: PaymentId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub reverses: Option<PaymentId>,
}

/// balance of one invoice as of a date
#[derive(Debug, Serialize, Deserialize)]
pub struct DebtView {
    pub invoice_number: String,
    pub child_id: ChildId,
    pub period: Period,
    pub as_of: NaiveDate,
    pub status: InvoiceStatus,
    pub total: Money,
    pub total_paid: Money,
    pub remaining: Money,
    pub days_overdue: u32,
    pub tier: Tier,
    pub entries: Vec<LedgerEntryView>,
}

impl DebtView {
    pub fn from_debt(debt: &Debt, thresholds: &AgingThresholds) -> Self {
        DebtView {
            invoice_number: debt.id().to_string(),
            child_id: debt.invoice.child_id().to_string(),
            period: debt.invoice.period(),
            as_of: debt.as_of,
            status: debt.status(),
            total: debt.invoice.total(),
            total_paid: debt.total_paid(),
            remaining: debt.remaining(),
            days_overdue: debt.days_overdue(),
            tier: debt.tier(thresholds),
            entries: debt
                .payments
                .iter()
                .map(|p| LedgerEntryView {
                    id: p.id,
                    amount: p.amount,
                    method: p.method,
                    reference: p.reference.clone(),
                    recorded_at: p.recorded_at,
                    reverses: p.reverses(),
                })
                .collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// everything a child's family currently owes
#[derive(Debug, Serialize, Deserialize)]
pub struct ChildBalance {
    pub child_id: ChildId,
    pub as_of: NaiveDate,
    pub total_invoiced: Money,
    pub total_paid: Money,
    pub outstanding: Money,
    /// most severe tier among open debts
    pub worst_tier: Tier,
    pub open_debts: Vec<DebtView>,
}

impl ChildBalance {
    pub fn from_debts(
        child_id: impl Into<ChildId>,
        as_of: NaiveDate,
        debts: &[Debt],
        thresholds: &AgingThresholds,
    ) -> Self {
        let open_debts: Vec<DebtView> = debts
            .iter()
            .filter(|d| !d.is_settled())
            .map(|d| DebtView::from_debt(d, thresholds))
            .collect();

        ChildBalance {
            child_id: child_id.into(),
            as_of,
            total_invoiced: debts.iter().map(|d| d.invoice.total()).sum(),
            total_paid: debts.iter().map(|d| d.total_paid()).sum(),
            outstanding: debts.iter().map(|d| d.remaining()).sum(),
            worst_tier: open_debts
                .iter()
                .map(|d| d.tier)
                .max()
                .unwrap_or(Tier::NotOverdue),
            open_debts,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
