//! Capture validation and settlement against the balance.
//!
//! The controller is the only writer of the balance. Its idempotency guard
//! is keyed by window id, so it lapses on its own when the next window opens.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{CycleState, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureOutcome {
    Accepted,
    RejectedAlreadyCaptured,
    RejectedInsufficientBalance,
    RejectedNotOpen,
}

impl CaptureOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureOutcome::Accepted => "accepted",
            CaptureOutcome::RejectedAlreadyCaptured => "rejected_already_captured",
            CaptureOutcome::RejectedInsufficientBalance => "rejected_insufficient_balance",
            CaptureOutcome::RejectedNotOpen => "rejected_not_open",
        }
    }
}

/// Result of one capture request. Not retained by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureAttempt {
    pub outcome: CaptureOutcome,
    /// Tier of the open window; `None` when no window was open.
    pub tier: Option<Tier>,
    /// Debited amount when accepted, required amount when the balance was
    /// short, otherwise 0.
    pub cost: u64,
    pub window_id: u64,
    pub balance_after: u64,
}

impl CaptureAttempt {
    pub fn is_accepted(&self) -> bool {
        self.outcome == CaptureOutcome::Accepted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BalanceError {
    #[error("credit amount must be greater than zero")]
    ZeroCredit,
    #[error("credit of {amount} would overflow balance {balance}")]
    Overflow { balance: u64, amount: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureController {
    balance: u64,
    captured_window: Option<u64>,
}

impl CaptureController {
    pub fn new(balance: u64) -> Self {
        Self {
            balance,
            captured_window: None,
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Whether `window_id` has been captured.
    pub fn is_captured(&self, window_id: u64) -> bool {
        self.captured_window == Some(window_id)
    }

    /// Validates and settles a capture against the current cycle state.
    ///
    /// Checks, in order: window open, not yet captured, balance covers cost.
    /// Every rejection leaves balance and guard untouched.
    pub fn attempt_capture(&mut self, state: &CycleState) -> CaptureAttempt {
        let window_id = state.window_id;

        let Some(tier) = state.open_tier() else {
            return self.rejected(CaptureOutcome::RejectedNotOpen, None, 0, window_id);
        };

        if self.is_captured(window_id) {
            return self.rejected(CaptureOutcome::RejectedAlreadyCaptured, Some(tier), 0, window_id);
        }

        let cost = tier.cost();
        let Some(remaining) = self.balance.checked_sub(cost) else {
            return self.rejected(
                CaptureOutcome::RejectedInsufficientBalance,
                Some(tier),
                cost,
                window_id,
            );
        };

        self.captured_window = Some(window_id);
        self.balance = remaining;
        CaptureAttempt {
            outcome: CaptureOutcome::Accepted,
            tier: Some(tier),
            cost,
            window_id,
            balance_after: self.balance,
        }
    }

    /// Adds purchased credits. Returns the new balance.
    pub fn credit_balance(&mut self, amount: u64) -> Result<u64, BalanceError> {
        if amount == 0 {
            return Err(BalanceError::ZeroCredit);
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(BalanceError::Overflow {
                balance: self.balance,
                amount,
            })?;
        Ok(self.balance)
    }

    fn rejected(
        &self,
        outcome: CaptureOutcome,
        tier: Option<Tier>,
        cost: u64,
        window_id: u64,
    ) -> CaptureAttempt {
        CaptureAttempt {
            outcome,
            tier,
            cost,
            window_id,
            balance_after: self.balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::Phase;

    fn open_state(window_id: u64, rare: bool) -> CycleState {
        CycleState {
            phase: Phase::Open,
            remaining: 3,
            is_rare_tier: rare,
            window_id,
            warned: true,
            cycles_completed: 0,
        }
    }

    #[test]
    fn test_rejects_when_not_open() {
        let mut ctl = CaptureController::new(5);
        let state = CycleState::new(10);
        let attempt = ctl.attempt_capture(&state);
        assert_eq!(attempt.outcome, CaptureOutcome::RejectedNotOpen);
        assert_eq!(attempt.tier, None);
        assert_eq!(attempt.cost, 0);
        assert_eq!(ctl.balance(), 5);
    }

    #[test]
    fn test_second_capture_rejected() {
        let mut ctl = CaptureController::new(5);
        let state = open_state(1, false);
        let first = ctl.attempt_capture(&state);
        assert!(first.is_accepted());
        assert_eq!(first.cost, 1);
        assert_eq!(first.balance_after, 4);

        for _ in 0..3 {
            let again = ctl.attempt_capture(&state);
            assert_eq!(again.outcome, CaptureOutcome::RejectedAlreadyCaptured);
            assert_eq!(again.cost, 0);
        }
        assert_eq!(ctl.balance(), 4);
    }

    #[test]
    fn test_insufficient_balance_reports_required_cost() {
        let mut ctl = CaptureController::new(2);
        let attempt = ctl.attempt_capture(&open_state(1, true));
        assert_eq!(attempt.outcome, CaptureOutcome::RejectedInsufficientBalance);
        assert_eq!(attempt.tier, Some(Tier::Rare));
        assert_eq!(attempt.cost, 3);
        assert_eq!(ctl.balance(), 2);
        assert!(!ctl.is_captured(1));
    }

    #[test]
    fn test_guard_lapses_on_next_window() {
        let mut ctl = CaptureController::new(2);
        assert!(ctl.attempt_capture(&open_state(1, false)).is_accepted());
        assert!(ctl.attempt_capture(&open_state(2, false)).is_accepted());
        assert_eq!(ctl.balance(), 0);
        let broke = ctl.attempt_capture(&open_state(3, false));
        assert_eq!(broke.outcome, CaptureOutcome::RejectedInsufficientBalance);
    }

    #[test]
    fn test_credit_balance() {
        let mut ctl = CaptureController::new(0);
        assert_eq!(ctl.credit_balance(10), Ok(10));
        assert_eq!(ctl.credit_balance(0), Err(BalanceError::ZeroCredit));
        let mut full = CaptureController::new(u64::MAX - 1);
        assert_eq!(
            full.credit_balance(2),
            Err(BalanceError::Overflow { balance: u64::MAX - 1, amount: 2 })
        );
        assert_eq!(full.balance(), u64::MAX - 1);
    }
}
