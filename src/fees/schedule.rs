use chrono::{DateTime, NaiveDate, Utc};

use crate::config::{BillingConfig, PaymentTerms};
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::fees::attendance::AttendanceCalculator;
use crate::invoice::{Invoice, PriceBreakdown};
use crate::types::{AttendanceRecord, Child, FeeKind, FeeLineItem, Period};

/// turns configured fee line items and attendance into a priced invoice
#[derive(Debug, Clone)]
pub struct FeeScheduleResolver {
    attendance: AttendanceCalculator,
    terms: PaymentTerms,
    currency_scale: u32,
}

impl FeeScheduleResolver {
    pub fn new(config: &BillingConfig) -> Self {
        Self {
            attendance: AttendanceCalculator::new(config.attendance, config.currency_scale),
            terms: config.payment_terms.clone(),
            currency_scale: config.currency_scale,
        }
    }

    /// validate line items before pricing
    pub fn validate_items(items: &[FeeLineItem]) -> Result<()> {
        for item in items {
            if item.amount.is_negative() {
                return Err(BillingError::InvalidFeeConfiguration {
                    message: format!(
                        "line item '{}' ({:?}) has negative amount {}",
                        item.id, item.kind, item.amount
                    ),
                });
            }
        }
        Ok(())
    }

    /// compute subtotal, discounts, attendance deduction and clamped total
    pub fn price(
        &self,
        items: &[FeeLineItem],
        attendance: Option<&AttendanceRecord>,
    ) -> Result<PriceBreakdown> {
        Self::validate_items(items)?;

        let mut subtotal = Money::ZERO;
        let mut discount_total = Money::ZERO;
        let mut base_fee = Money::ZERO;

        for item in items {
            match item.kind {
                FeeKind::Monthly => {
                    subtotal += item.amount;
                    base_fee += item.amount;
                }
                FeeKind::Food | FeeKind::Transport | FeeKind::Extra => {
                    subtotal += item.amount;
                }
                FeeKind::Discount => {
                    discount_total += item.amount;
                }
            }
        }

        let attendance_deduction = match attendance {
            Some(record) => {
                record.validate()?;
                self.attendance.calculate(base_fee, record).deduction
            }
            None => Money::ZERO,
        };

        let total = (subtotal - discount_total - attendance_deduction)
            .clamp_non_negative()
            .round_to_unit(self.currency_scale);

        log::debug!(
            "priced {} items: subtotal {}, discounts {}, attendance {}, total {}",
            items.len(),
            subtotal,
            discount_total,
            attendance_deduction,
            total
        );

        Ok(PriceBreakdown {
            subtotal,
            discount_total,
            attendance_deduction,
            total,
        })
    }

    /// due date of an invoice for `period`
    pub fn due_date(&self, period: Period) -> NaiveDate {
        period.day(self.terms.due_day_of_month)
    }

    /// build the invoice once a number has been reserved
    pub fn issue(
        &self,
        number: String,
        child: &Child,
        period: Period,
        items: Vec<FeeLineItem>,
        attendance: Option<AttendanceRecord>,
        issued_at: DateTime<Utc>,
    ) -> Result<Invoice> {
        let breakdown = self.price(&items, attendance.as_ref())?;
        Ok(Invoice::issue(
            number,
            child,
            period,
            issued_at,
            self.due_date(period),
            items,
            attendance,
            breakdown,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn resolver() -> FeeScheduleResolver {
        FeeScheduleResolver::new(&BillingConfig::kindergarten_default())
    }

    fn base_items() -> Vec<FeeLineItem> {
        vec![
            FeeLineItem::new("tuition", FeeKind::Monthly, "Tuition", Money::from_major(1_500_000)),
            FeeLineItem::new("food", FeeKind::Food, "Meals", Money::from_major(300_000)),
            FeeLineItem::new("bus", FeeKind::Transport, "Bus", Money::ZERO),
        ]
    }

    #[test]
    fn test_full_attendance_pricing() {
        let attendance = AttendanceRecord::new(22, 22).unwrap();
        let breakdown = resolver().price(&base_items(), Some(&attendance)).unwrap();

        assert_eq!(breakdown.subtotal, Money::from_major(1_800_000));
        assert_eq!(breakdown.attendance_deduction, Money::ZERO);
        assert_eq!(breakdown.total, Money::from_major(1_800_000));
    }

    #[test]
    fn test_absence_pricing() {
        let attendance = AttendanceRecord::new(22, 15).unwrap();
        let breakdown = resolver().price(&base_items(), Some(&attendance)).unwrap();

        assert_eq!(breakdown.attendance_deduction, Money::from_major(136_364));
        assert_eq!(breakdown.total, Money::from_major(1_663_636));
    }

    #[test]
    fn test_deduction_only_uses_monthly_fee() {
        // food does not enlarge the deduction base
        let mut items = base_items();
        items.push(FeeLineItem::new("art", FeeKind::Extra, "Art class", Money::from_major(200_000)));
        let attendance = AttendanceRecord::new(22, 15).unwrap();
        let breakdown = resolver().price(&items, Some(&attendance)).unwrap();

        assert_eq!(breakdown.subtotal, Money::from_major(2_000_000));
        assert_eq!(breakdown.attendance_deduction, Money::from_major(136_364));
    }

    #[test]
    fn test_discount_clamped_total() {
        let mut items = base_items();
        items.push(FeeLineItem::new("sibling", FeeKind::Discount, "Sibling", Money::from_major(2_500_000)));
        let breakdown = resolver().price(&items, None).unwrap();

        assert_eq!(breakdown.discount_total, Money::from_major(2_500_000));
        assert_eq!(breakdown.total, Money::ZERO);
    }

    #[test]
    fn test_negative_amount_rejected() {
        let items = vec![FeeLineItem::new("food", FeeKind::Food, "Meals", Money::from_major(-1))];
        assert!(matches!(
            resolver().price(&items, None),
            Err(BillingError::InvalidFeeConfiguration { .. })
        ));
    }

    #[test]
    fn test_invalid_attendance_rejected() {
        let attendance = AttendanceRecord { working_days: 10, present_days: 12 };
        assert!(matches!(
            resolver().price(&base_items(), Some(&attendance)),
            Err(BillingError::InvalidAttendance { .. })
        ));
    }

    #[test]
    fn test_issue_sets_due_date() {
        let child = Child::new("c-1", "Aziza");
        let period = Period::new(2024, 9).unwrap();
        let issued_at = Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap();
        let invoice = resolver()
            .issue("INV-202409-0001".to_string(), &child, period, base_items(), None, issued_at)
            .unwrap();

        assert_eq!(invoice.due_date(), NaiveDate::from_ymd_opt(2024, 9, 10).unwrap());
        assert_eq!(invoice.total(), Money::from_major(1_800_000));
        assert_eq!(invoice.amount_for(FeeKind::Food), Money::from_major(300_000));
        assert_eq!(invoice.child_name(), "Aziza");
    }
}
