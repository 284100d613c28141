use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::decimal::{Money, Rate};
use crate::errors::{BillingError, Result};
use crate::types::{FeeKind, FeeLineItem, Locale, Tier};

/// engine configuration, read once at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    /// decimal places of the smallest currency unit (0 for so'm)
    pub currency_scale: u32,
    pub payment_terms: PaymentTerms,
    pub attendance: AttendanceConfig,
    pub reminders: ReminderConfig,
    /// default fee line items offered by the kindergarten
    pub fee_catalog: Vec<FeeLineItem>,
}

/// when an issued invoice falls due
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentTerms {
    /// due on this day of the billed month
    pub due_day_of_month: u32,
}

/// attendance deduction parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// absences absorbed without any deduction
    pub grace_days: u32,
    /// share of the daily rate credited per absence beyond grace
    pub penalty_rate: Rate,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            grace_days: 3,
            penalty_rate: Rate::from_decimal(dec!(0.5)),
        }
    }
}

/// reminder template for one tier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderTemplate {
    pub tier: Tier,
    pub min_days_overdue: u32,
    pub text_by_locale: BTreeMap<Locale, String>,
}

/// reminder thresholds and templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// locale used when a template lacks the requested one
    pub default_locale: Locale,
    pub templates: Vec<ReminderTemplate>,
}

impl ReminderConfig {
    /// check ordering and completeness of the tier thresholds
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for template in &self.templates {
            if !template.tier.is_overdue() {
                return Err(BillingError::InvalidConfiguration {
                    message: "NotOverdue cannot carry a reminder template".to_string(),
                });
            }
            if !seen.insert(template.tier) {
                return Err(BillingError::InvalidConfiguration {
                    message: format!("duplicate template for tier {}", template.tier),
                });
            }
            if !template.text_by_locale.contains_key(&self.default_locale) {
                return Err(BillingError::MissingTemplate {
                    tier: template.tier,
                    locale: self.default_locale,
                });
            }
        }

        for tier in Tier::ESCALATING {
            if !seen.contains(&tier) {
                return Err(BillingError::InvalidConfiguration {
                    message: format!("missing template for tier {}", tier),
                });
            }
        }

        // thresholds must increase strictly in tier order
        let thresholds = self.thresholds();
        for pair in thresholds.windows(2) {
            if pair[1].1 <= pair[0].1 {
                return Err(BillingError::InvalidConfiguration {
                    message: format!(
                        "threshold for {} ({} days) must exceed {} ({} days)",
                        pair[1].0, pair[1].1, pair[0].0, pair[0].1
                    ),
                });
            }
        }

        Ok(())
    }

    /// (tier, min days overdue) sorted by tier
    pub fn thresholds(&self) -> Vec<(Tier, u32)> {
        let mut thresholds: Vec<(Tier, u32)> = self
            .templates
            .iter()
            .map(|t| (t.tier, t.min_days_overdue))
            .collect();
        thresholds.sort_by_key(|(tier, _)| *tier);
        thresholds
    }

    pub fn template(&self, tier: Tier) -> Option<&ReminderTemplate> {
        self.templates.iter().find(|t| t.tier == tier)
    }
}

impl BillingConfig {
    /// parse and validate a json configuration document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BillingConfig = serde_json::from_str(json).map_err(|e| {
            if e.to_string().contains("unknown variant") {
                BillingError::InvalidFeeConfiguration {
                    message: e.to_string(),
                }
            } else {
                BillingError::InvalidConfiguration {
                    message: e.to_string(),
                }
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// serialize to pretty json
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BillingError::InvalidConfiguration {
            message: e.to_string(),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=28).contains(&self.payment_terms.due_day_of_month) {
            return Err(BillingError::InvalidConfiguration {
                message: format!(
                    "due day {} must be between 1 and 28",
                    self.payment_terms.due_day_of_month
                ),
            });
        }

        if !self.attendance.penalty_rate.is_unit_interval() {
            return Err(BillingError::InvalidConfiguration {
                message: format!(
                    "attendance penalty rate {} must be between 0% and 100%",
                    self.attendance.penalty_rate
                ),
            });
        }

        if self.currency_scale > 8 {
            return Err(BillingError::InvalidConfiguration {
                message: format!("currency scale {} exceeds 8 decimals", self.currency_scale),
            });
        }

        for item in &self.fee_catalog {
            if item.amount.is_negative() {
                return Err(BillingError::InvalidFeeConfiguration {
                    message: format!("catalog item '{}' has negative amount {}", item.id, item.amount),
                });
            }
        }

        self.reminders.validate()
    }

    /// catalog items of the given kind
    pub fn catalog_items(&self, kind: FeeKind) -> Vec<FeeLineItem> {
        self.fee_catalog.iter().filter(|i| i.kind == kind).cloned().collect()
    }

    /// preset for a typical kindergarten
    pub fn kindergarten_default() -> Self {
        Self {
            currency_scale: 0,
            payment_terms: PaymentTerms { due_day_of_month: 10 },
            attendance: AttendanceConfig::default(),
            reminders: ReminderConfig {
                default_locale: Locale::Uz,
                templates: vec![
                    template(
                        Tier::Gentle,
                        0,
                        "Hurmatli ota-ona, {childName} uchun {month} oyi to'lovi {amount} so'm. Iltimos, to'lovni amalga oshiring.",
                        "Уважаемые родители, оплата за {month} для {childName} составляет {amount} сум. Пожалуйста, оплатите.",
                        "Dear parent, the {month} fee for {childName} is {amount}. Please arrange payment.",
                    ),
                    template(
                        Tier::Reminder,
                        7,
                        "Eslatma: {childName} uchun {month} oyi to'lovi ({amount} so'm) {days} kun kechikmoqda.",
                        "Напоминание: оплата за {month} для {childName} ({amount} сум) просрочена на {days} дн.",
                        "Reminder: the {month} fee for {childName} ({amount}) is {days} days overdue.",
                    ),
                    template(
                        Tier::Urgent,
                        14,
                        "Shoshilinch: {childName} uchun {amount} so'm qarzdorlik {days} kundan beri to'lanmagan.",
                        "Срочно: задолженность {amount} сум за {childName} не погашена {days} дн.",
                        "Urgent: {amount} owed for {childName} has been unpaid for {days} days.",
                    ),
                    template(
                        Tier::Final,
                        30,
                        "Oxirgi ogohlantirish: {childName} uchun {month} oyi qarzi {amount} so'm, {days} kun kechikish.",
                        "Последнее предупреждение: долг за {month} для {childName}: {amount} сум, просрочка {days} дн.",
                        "Final notice: the {month} balance of {amount} for {childName} is {days} days overdue.",
                    ),
                ],
            },
            fee_catalog: vec![
                FeeLineItem::new("tuition", FeeKind::Monthly, "Monthly tuition", Money::from_major(1_500_000)),
                FeeLineItem::new("food", FeeKind::Food, "Meals", Money::from_major(300_000)),
            ],
        }
    }
}

fn template(tier: Tier, min_days: u32, uz: &str, ru: &str, en: &str) -> ReminderTemplate {
    let mut text_by_locale = BTreeMap::new();
    text_by_locale.insert(Locale::Uz, uz.to_string());
    text_by_locale.insert(Locale::Ru, ru.to_string());
    text_by_locale.insert(Locale::En, en.to_string());
    ReminderTemplate {
        tier,
        min_days_overdue: min_days,
        text_by_locale,
    }
}
