use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::AttendanceConfig;
use crate::decimal::{Money, Rate};
use crate::types::AttendanceRecord;

/// attendance deduction breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceDeduction {
    pub deduction: Money,
    pub absent_days: u32,
    /// absences beyond grace that were credited
    pub days_credited: u32,
    pub daily_rate: Money,
    pub grace_applied: bool,
}

impl AttendanceDeduction {
    fn none(absent_days: u32) -> Self {
        Self {
            deduction: Money::ZERO,
            absent_days,
            days_credited: 0,
            daily_rate: Money::ZERO,
            grace_applied: true,
        }
    }
}

/// proportional credit for absences beyond the grace threshold
///
/// `(absent - grace) * base_fee / working_days * penalty_rate`, rounded
/// half-up to the currency unit and capped at `base_fee`. A period with no
/// working days yields no deduction.
pub fn deduction(
    base_fee: Money,
    working_days: u32,
    present_days: u32,
    grace_days: u32,
    penalty_rate: Rate,
    currency_scale: u32,
) -> Money {
    calculate(base_fee, working_days, present_days, grace_days, penalty_rate, currency_scale).deduction
}

/// same as [`deduction`] with the full breakdown
pub fn calculate(
    base_fee: Money,
    working_days: u32,
    present_days: u32,
    grace_days: u32,
    penalty_rate: Rate,
    currency_scale: u32,
) -> AttendanceDeduction {
    let absent_days = working_days.saturating_sub(present_days);

    if working_days == 0 || absent_days <= grace_days || !base_fee.is_positive() {
        return AttendanceDeduction::none(absent_days);
    }

    let days_credited = absent_days - grace_days;
    let daily_rate = base_fee.as_decimal() / Decimal::from(working_days);
    let raw = Decimal::from(days_credited) * daily_rate * penalty_rate.as_decimal();

    let deduction = Money::from_decimal(raw)
        .round_to_unit(currency_scale)
        .clamp_non_negative()
        .min(base_fee);

    AttendanceDeduction {
        deduction,
        absent_days,
        days_credited,
        daily_rate: Money::from_decimal(daily_rate).round_to_unit(currency_scale),
        grace_applied: false,
    }
}

/// attendance calculator bound to configured grace and penalty parameters
#[derive(Debug, Clone, Copy)]
pub struct AttendanceCalculator {
    config: AttendanceConfig,
    currency_scale: u32,
}

impl AttendanceCalculator {
    pub fn new(config: AttendanceConfig, currency_scale: u32) -> Self {
        Self {
            config,
            currency_scale,
        }
    }

    pub fn calculate(&self, base_fee: Money, record: &AttendanceRecord) -> AttendanceDeduction {
        calculate(
            base_fee,
            record.working_days,
            record.present_days,
            self.config.grace_days,
            self.config.penalty_rate,
            self.currency_scale,
        )
    }
}
