use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ReminderConfig;
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::ledger::Debt;
use crate::types::{ChildId, Locale, RepeatPolicy, Tier};

/// message that should be sent to a debtor, independent of transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRequest {
    pub debt_id: String,
    pub child_id: ChildId,
    pub tier: Tier,
    pub locale: Locale,
    pub message: String,
    /// remaining balance the message quotes
    pub amount: Money,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub repeat_policy: Option<RepeatPolicy>,
}

/// dedup key for deliveries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReminderKey {
    pub debt_id: String,
    pub tier: Tier,
}

/// identity of a scheduled reminder
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleKey {
    pub debt_id: String,
    pub tier: Tier,
    pub scheduled_at: DateTime<Utc>,
}

impl ReminderRequest {
    pub fn key(&self) -> ReminderKey {
        ReminderKey {
            debt_id: self.debt_id.clone(),
            tier: self.tier,
        }
    }

    /// `None` for immediate requests
    pub fn schedule_key(&self) -> Option<ScheduleKey> {
        self.scheduled_at.map(|scheduled_at| ScheduleKey {
            debt_id: self.debt_id.clone(),
            tier: self.tier,
            scheduled_at,
        })
    }

    pub fn is_immediate(&self) -> bool {
        self.scheduled_at.is_none()
    }
}

/// renders reminder templates into requests
///
/// Pure projection: building a request has no side effects and knows
/// nothing about what was already sent.
#[derive(Debug, Clone)]
pub struct ReminderBuilder {
    config: ReminderConfig,
}

impl ReminderBuilder {
    pub fn new(config: ReminderConfig) -> Self {
        Self { config }
    }

    /// immediate reminder for `debt` at `tier`
    pub fn build(&self, debt: &Debt, tier: Tier, locale: Locale) -> Result<ReminderRequest> {
        if !tier.is_overdue() || debt.is_settled() {
            return Err(BillingError::ReminderSuppressed {
                invoice_number: debt.id().to_string(),
                tier,
            });
        }

        let text = self.template_text(tier, locale)?;
        let amount = debt.remaining();

        Ok(ReminderRequest {
            debt_id: debt.id().to_string(),
            child_id: debt.invoice.child_id().to_string(),
            tier,
            locale,
            message: render(text, debt, amount, locale),
            amount,
            scheduled_at: None,
            repeat_policy: None,
        })
    }

    /// same message, to be dispatched later by a scheduler
    pub fn schedule(
        &self,
        debt: &Debt,
        tier: Tier,
        locale: Locale,
        at: DateTime<Utc>,
        repeat_policy: RepeatPolicy,
    ) -> Result<ReminderRequest> {
        let mut request = self.build(debt, tier, locale)?;
        request.scheduled_at = Some(at);
        request.repeat_policy = Some(repeat_policy);
        Ok(request)
    }

    fn template_text(&self, tier: Tier, locale: Locale) -> Result<&str> {
        let template = self
            .config
            .template(tier)
            .ok_or(BillingError::MissingTemplate { tier, locale })?;

        if let Some(text) = template.text_by_locale.get(&locale) {
            return Ok(text.as_str());
        }

        log::debug!(
            "no {} text for tier {}, falling back to {}",
            locale,
            tier,
            self.config.default_locale
        );
        template
            .text_by_locale
            .get(&self.config.default_locale)
            .map(String::as_str)
            .ok_or(BillingError::MissingTemplate { tier, locale })
    }
}

fn render(text: &str, debt: &Debt, amount: Money, locale: Locale) -> String {
    text.replace("{childName}", debt.invoice.child_name())
        .replace("{month}", &debt.invoice.period().label(locale))
        .replace("{amount}", &amount.format_grouped(locale))
        .replace("{days}", &debt.days_overdue().to_string())
}
