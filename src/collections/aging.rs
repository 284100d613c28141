use serde::{Deserialize, Serialize};

use crate::config::ReminderConfig;
use crate::errors::{BillingError, Result};
use crate::types::Tier;

/// validated, strictly increasing day thresholds per tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingThresholds {
    /// (tier, min days overdue) in escalation order
    levels: Vec<(Tier, u32)>,
}

impl AgingThresholds {
    pub fn new(mut levels: Vec<(Tier, u32)>) -> Result<Self> {
        levels.sort_by_key(|(tier, _)| *tier);

        if levels.iter().map(|(tier, _)| *tier).ne(Tier::ESCALATING) {
            return Err(BillingError::InvalidConfiguration {
                message: "thresholds must define Gentle, Reminder, Urgent and Final exactly once"
                    .to_string(),
            });
        }

        for pair in levels.windows(2) {
            if pair[1].1 <= pair[0].1 {
                return Err(BillingError::InvalidConfiguration {
                    message: format!(
                        "threshold for {} ({} days) must exceed {} ({} days)",
                        pair[1].0, pair[1].1, pair[0].0, pair[0].1
                    ),
                });
            }
        }

        Ok(Self { levels })
    }

    pub fn from_config(config: &ReminderConfig) -> Result<Self> {
        Self::new(config.thresholds())
    }

    /// Gentle 0, Reminder 7, Urgent 14, Final 30
    pub fn kindergarten_default() -> Self {
        Self {
            levels: vec![
                (Tier::Gentle, 0),
                (Tier::Reminder, 7),
                (Tier::Urgent, 14),
                (Tier::Final, 30),
            ],
        }
    }

    pub fn min_days(&self, tier: Tier) -> Option<u32> {
        self.levels.iter().find(|(t, _)| *t == tier).map(|(_, d)| *d)
    }

    pub fn levels(&self) -> &[(Tier, u32)] {
        &self.levels
    }
}

/// highest tier whose threshold is reached, `NotOverdue` below the first
pub fn classify(days_overdue: u32, thresholds: &AgingThresholds) -> Tier {
    thresholds
        .levels
        .iter()
        .rev()
        .find(|(_, min_days)| days_overdue >= *min_days)
        .map(|(tier, _)| *tier)
        .unwrap_or(Tier::NotOverdue)
}
