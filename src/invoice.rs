use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{AttendanceRecord, Child, ChildId, FeeKind, FeeLineItem, Period};

/// priced, immutable statement of what is owed for one child and one period
///
/// Payment status is not stored here; it is derived from the ledger through
/// [`crate::ledger::Debt::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    number: String,
    child_id: ChildId,
    child_name: String,
    period: Period,
    issued_at: DateTime<Utc>,
    due_date: NaiveDate,
    line_items: Vec<FeeLineItem>,
    attendance: Option<AttendanceRecord>,
    subtotal: Money,
    discount_total: Money,
    attendance_deduction: Money,
    total: Money,
}

/// amounts computed by the fee schedule resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub discount_total: Money,
    pub attendance_deduction: Money,
    pub total: Money,
}

impl Invoice {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn issue(
        number: String,
        child: &Child,
        period: Period,
        issued_at: DateTime<Utc>,
        due_date: NaiveDate,
        line_items: Vec<FeeLineItem>,
        attendance: Option<AttendanceRecord>,
        breakdown: PriceBreakdown,
    ) -> Self {
        Self {
            number,
            child_id: child.id.clone(),
            child_name: child.name.clone(),
            period,
            issued_at,
            due_date,
            line_items,
            attendance,
            subtotal: breakdown.subtotal,
            discount_total: breakdown.discount_total,
            attendance_deduction: breakdown.attendance_deduction,
            total: breakdown.total,
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn child_id(&self) -> &str {
        &self.child_id
    }

    pub fn child_name(&self) -> &str {
        &self.child_name
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn line_items(&self) -> &[FeeLineItem] {
        &self.line_items
    }

    pub fn attendance(&self) -> Option<&AttendanceRecord> {
        self.attendance.as_ref()
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn discount_total(&self) -> Money {
        self.discount_total
    }

    pub fn attendance_deduction(&self) -> Money {
        self.attendance_deduction
    }

    pub fn total(&self) -> Money {
        self.total
    }

    /// sum of line items of one kind
    pub fn amount_for(&self, kind: FeeKind) -> Money {
        self.line_items
            .iter()
            .filter(|item| item.kind == kind)
            .map(|item| item.amount)
            .sum()
    }
}
