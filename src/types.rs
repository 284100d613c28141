use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{BillingError, Result};

/// identifier of an enrolled child
pub type ChildId = String;

/// unique identifier for a ledger entry
pub type PaymentId = Uuid;

/// the child an invoice is issued for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    pub id: ChildId,
    pub name: String,
}

impl Child {
    pub fn new(id: impl Into<ChildId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// message locale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Uz,
    Ru,
    En,
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Locale::Uz => "uz",
            Locale::Ru => "ru",
            Locale::En => "en",
        };
        f.write_str(code)
    }
}

/// billing period (calendar month)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "PeriodRepr")]
pub struct Period {
    year: i32,
    month: u32,
}

/// unvalidated wire form of a period
#[derive(Deserialize)]
struct PeriodRepr {
    year: i32,
    month: u32,
}

impl TryFrom<PeriodRepr> for Period {
    type Error = BillingError;

    fn try_from(repr: PeriodRepr) -> Result<Self> {
        Period::new(repr.year, repr.month)
    }
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(1000..=9999).contains(&year) {
            return Err(BillingError::InvalidPeriod {
                message: format!("{}-{:02} is not a valid year/month", year, month),
            });
        }
        Ok(Self { year, month })
    }

    /// period containing the given date
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// parse a `YYYYMM` code
    pub fn from_code(code: &str) -> Result<Self> {
        let invalid = || BillingError::InvalidPeriod {
            message: format!("'{}' is not a YYYYMM code", code),
        };
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let year = code[..4].parse::<i32>().map_err(|_| invalid())?;
        let month = code[4..].parse::<u32>().map_err(|_| invalid())?;
        Self::new(year, month)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// `YYYYMM`
    pub fn code(&self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next().first_day() - Duration::days(1)
    }

    /// date within this period, day clamped to the month length
    pub fn day(&self, day: u32) -> NaiveDate {
        let last = self.last_day();
        NaiveDate::from_ymd_opt(self.year, self.month, day.clamp(1, last.day())).unwrap_or(last)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// localized "month year" label used in reminder texts
    pub fn label(&self, locale: Locale) -> String {
        const EN: [&str; 12] = [
            "January", "February", "March", "April", "May", "June",
            "July", "August", "September", "October", "November", "December",
        ];
        const RU: [&str; 12] = [
            "январь", "февраль", "март", "апрель", "май", "июнь",
            "июль", "август", "сентябрь", "октябрь", "ноябрь", "декабрь",
        ];
        const UZ: [&str; 12] = [
            "yanvar", "fevral", "mart", "aprel", "may", "iyun",
            "iyul", "avgust", "sentabr", "oktabr", "noyabr", "dekabr",
        ];
        let idx = (self.month - 1) as usize;
        let name = match locale {
            Locale::En => EN[idx],
            Locale::Ru => RU[idx],
            Locale::Uz => UZ[idx],
        };
        format!("{} {}", name, self.year)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// fee line-item kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeKind {
    /// base monthly tuition
    Monthly,
    Food,
    Transport,
    /// extra classes and activities
    Extra,
    /// subtracted from the subtotal
    Discount,
}

impl FeeKind {
    /// true for kinds that add to the subtotal
    pub fn is_charge(&self) -> bool {
        !matches!(self, FeeKind::Discount)
    }
}

/// configured fee line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeLineItem {
    pub id: String,
    pub kind: FeeKind,
    pub label: String,
    pub amount: Money,
}

impl FeeLineItem {
    pub fn new(id: impl Into<String>, kind: FeeKind, label: impl Into<String>, amount: Money) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            amount,
        }
    }
}

/// attendance for one child over one period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub working_days: u32,
    pub present_days: u32,
}

impl AttendanceRecord {
    pub fn new(working_days: u32, present_days: u32) -> Result<Self> {
        let record = Self { working_days, present_days };
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> Result<()> {
        if self.present_days > self.working_days {
            return Err(BillingError::InvalidAttendance {
                working_days: self.working_days,
                present_days: self.present_days,
            });
        }
        Ok(())
    }

    pub fn absent_days(&self) -> u32 {
        self.working_days.saturating_sub(self.present_days)
    }
}

/// payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Card,
    /// bank transfer, requires a reference
    Transfer,
}

/// invoice payment status, always derived from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
}

/// aging tier of an overdue debt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    /// not yet overdue, reminders suppressed
    NotOverdue,
    Gentle,
    Reminder,
    Urgent,
    Final,
}

impl Tier {
    /// tiers that carry a reminder template, in escalation order
    pub const ESCALATING: [Tier; 4] = [Tier::Gentle, Tier::Reminder, Tier::Urgent, Tier::Final];

    pub fn is_overdue(&self) -> bool {
        !matches!(self, Tier::NotOverdue)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// recurrence of a scheduled reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatPolicy {
    None,
    Daily,
    Weekly,
    EveryNDays(u32),
}

impl RepeatPolicy {
    /// next occurrence after `at`, `None` when the policy does not repeat
    pub fn next_after(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            RepeatPolicy::None => None,
            RepeatPolicy::Daily => at.checked_add_signed(Duration::days(1)),
            RepeatPolicy::Weekly => at.checked_add_signed(Duration::weeks(1)),
            RepeatPolicy::EveryNDays(0) => None,
            // past chrono's range there is no next occurrence
            RepeatPolicy::EveryNDays(n) => at.checked_add_signed(Duration::days(i64::from(*n))),
        }
    }
}
