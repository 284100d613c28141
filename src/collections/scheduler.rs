use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::collections::reminder::{ReminderRequest, ScheduleKey};
use crate::errors::{BillingError, Result};
use crate::types::RepeatPolicy;

/// result of cancelling a scheduled reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelOutcome {
    Cancelled,
    /// already dispatched; delivered messages cannot be retracted
    AlreadyFired,
    NotFound,
}

/// collaborator that turns scheduled requests into dispatches at the right time
pub trait ReminderScheduler {
    /// accept a request carrying `scheduled_at`
    fn schedule(&self, request: ReminderRequest) -> Result<ScheduleKey>;

    /// cancel by identity, a no-op once fired
    fn cancel(&self, key: &ScheduleKey) -> CancelOutcome;
}

#[derive(Debug, Clone)]
struct PendingReminder {
    key: ScheduleKey,
    request: ReminderRequest,
    next_at: DateTime<Utc>,
}

/// in-process scheduler with recurrence expansion
///
/// Nothing runs on its own: the host calls [`InMemoryScheduler::due`] from
/// its timer loop and hands the returned requests to delivery.
#[derive(Debug, Default)]
pub struct InMemoryScheduler {
    pending: Mutex<Vec<PendingReminder>>,
    fired: Mutex<HashSet<ScheduleKey>>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// drain occurrences due at `now`, re-arming recurring reminders
    pub fn due(&self, now: DateTime<Utc>) -> Vec<ReminderRequest> {
        let mut pending = self.pending.lock();
        let mut fired = self.fired.lock();
        let mut out = Vec::new();
        let mut still_pending = Vec::with_capacity(pending.len());

        for mut entry in pending.drain(..) {
            if entry.next_at > now {
                still_pending.push(entry);
                continue;
            }

            // catch up on occurrences missed while the host was idle
            let policy = entry.request.repeat_policy.unwrap_or(RepeatPolicy::None);
            let mut occurrence = entry.next_at;
            loop {
                let mut request = entry.request.clone();
                request.scheduled_at = Some(occurrence);
                out.push(request);

                match policy.next_after(occurrence) {
                    Some(next) if next <= now => occurrence = next,
                    Some(next) => {
                        entry.next_at = next;
                        still_pending.push(entry);
                        break;
                    }
                    None => {
                        fired.insert(entry.key);
                        break;
                    }
                }
            }
        }

        *pending = still_pending;
        out
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

impl ReminderScheduler for InMemoryScheduler {
    fn schedule(&self, request: ReminderRequest) -> Result<ScheduleKey> {
        let key = request.schedule_key().ok_or_else(|| BillingError::InvalidConfiguration {
            message: format!("reminder for {} has no scheduled time", request.debt_id),
        })?;

        let mut pending = self.pending.lock();
        if pending.iter().any(|p| p.key == key) {
            log::debug!("reminder {:?} already scheduled", key);
            return Ok(key);
        }

        pending.push(PendingReminder {
            key: key.clone(),
            next_at: key.scheduled_at,
            request,
        });
        Ok(key)
    }

    fn cancel(&self, key: &ScheduleKey) -> CancelOutcome {
        let mut pending = self.pending.lock();
        if let Some(pos) = pending.iter().position(|p| &p.key == key) {
            pending.remove(pos);
            return CancelOutcome::Cancelled;
        }
        if self.fired.lock().contains(key) {
            CancelOutcome::AlreadyFired
        } else {
            CancelOutcome::NotFound
        }
    }
}
