use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::collections::reminder::{ReminderKey, ReminderRequest};

/// outcome reported back by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// report of one delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub key: ReminderKey,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub outcome: DeliveryOutcome,
    pub reported_at: DateTime<Utc>,
}

/// chat or notification transport
pub trait DeliveryChannel {
    fn deliver(&self, request: &ReminderRequest) -> DeliveryOutcome;
}

/// caller-side record of delivered reminders, keyed by (debt, tier)
#[derive(Debug, Default)]
pub struct DeliveryLog {
    delivered: Mutex<HashMap<ReminderKey, DateTime<Utc>>>,
    failures: Mutex<Vec<DeliveryReport>>,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// true unless this (debt, tier) was already delivered
    pub fn should_send(&self, key: &ReminderKey) -> bool {
        !self.delivered.lock().contains_key(key)
    }

    pub fn record(&self, report: &DeliveryReport) {
        match &report.outcome {
            DeliveryOutcome::Delivered => {
                self.delivered.lock().insert(report.key.clone(), report.reported_at);
            }
            DeliveryOutcome::Failed(_) => {
                self.failures.lock().push(report.clone());
            }
        }
    }

    pub fn delivered_at(&self, key: &ReminderKey) -> Option<DateTime<Utc>> {
        self.delivered.lock().get(key).copied()
    }

    pub fn failures(&self) -> Vec<DeliveryReport> {
        self.failures.lock().clone()
    }

    /// deliver unless already delivered; `None` when skipped as a duplicate
    pub fn dispatch<C: DeliveryChannel + ?Sized>(
        &self,
        channel: &C,
        request: &ReminderRequest,
        now: DateTime<Utc>,
    ) -> Option<DeliveryReport> {
        let key = request.key();
        if !self.should_send(&key) {
            log::debug!("skipping duplicate reminder {:?}", key);
            return None;
        }

        let report = DeliveryReport {
            key,
            scheduled_at: request.scheduled_at,
            outcome: channel.deliver(request),
            reported_at: now,
        };
        self.record(&report);
        Some(report)
    }
}
