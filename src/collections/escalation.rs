use serde::{Deserialize, Serialize};

use crate::collections::aging::AgingThresholds;
use crate::ledger::Debt;
use crate::types::Tier;

/// escalation state of one debt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EscalationState {
    NotOverdue,
    Gentle,
    Reminder,
    Urgent,
    Final,
    /// debt paid in full; terminal
    Resolved,
}

impl EscalationState {
    /// reminder tier for this state, `None` when nothing should be sent
    pub fn tier(&self) -> Option<Tier> {
        match self {
            EscalationState::Gentle => Some(Tier::Gentle),
            EscalationState::Reminder => Some(Tier::Reminder),
            EscalationState::Urgent => Some(Tier::Urgent),
            EscalationState::Final => Some(Tier::Final),
            EscalationState::NotOverdue | EscalationState::Resolved => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EscalationState::Resolved)
    }
}

impl From<Tier> for EscalationState {
    fn from(tier: Tier) -> Self {
        match tier {
            Tier::NotOverdue => EscalationState::NotOverdue,
            Tier::Gentle => EscalationState::Gentle,
            Tier::Reminder => EscalationState::Reminder,
            Tier::Urgent => EscalationState::Urgent,
            Tier::Final => EscalationState::Final,
        }
    }
}

/// state change produced by re-evaluating a debt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationTransition {
    pub debt_id: String,
    pub from: EscalationState,
    pub to: EscalationState,
    pub days_overdue: u32,
}

/// per-debt escalation state machine, driven by external re-evaluation
///
/// The state only moves forward. `Resolved` can be entered from any state
/// once the debt is paid and is never left; a later overdue period is a
/// separate debt with its own tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationTracker {
    debt_id: String,
    state: EscalationState,
}

impl EscalationTracker {
    pub fn new(debt_id: impl Into<String>) -> Self {
        Self {
            debt_id: debt_id.into(),
            state: EscalationState::NotOverdue,
        }
    }

    pub fn debt_id(&self) -> &str {
        &self.debt_id
    }

    pub fn state(&self) -> EscalationState {
        self.state
    }

    /// re-evaluate the debt and advance if its tier moved forward
    pub fn evaluate(
        &mut self,
        debt: &Debt,
        thresholds: &AgingThresholds,
    ) -> Option<EscalationTransition> {
        if self.state.is_terminal() {
            return None;
        }

        let target = if debt.is_settled() {
            EscalationState::Resolved
        } else {
            EscalationState::from(debt.tier(thresholds))
        };

        if target <= self.state {
            return None;
        }

        let transition = EscalationTransition {
            debt_id: self.debt_id.clone(),
            from: self.state,
            to: target,
            days_overdue: debt.days_overdue(),
        };
        self.state = target;
        Some(transition)
    }
}
