//! User-facing notices derived from engine events and capture outcomes.

use serde::{Deserialize, Serialize};

use crate::engine::{CaptureAttempt, CaptureOutcome, PulseEvent, Tier};

/// How long a notice stays on screen.
pub const NOTICE_DURATION_MS: u64 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::Info => "info",
            NoticeKind::Success => "success",
            NoticeKind::Warning => "warning",
            NoticeKind::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub duration_ms: u64,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            duration_ms: NOTICE_DURATION_MS,
        }
    }

    /// Notice for a scheduler event. Ticks, countdown restarts and captured
    /// closes are silent.
    pub fn for_event(event: &PulseEvent) -> Option<Self> {
        match *event {
            PulseEvent::Warning => Some(Self::new(
                NoticeKind::Warning,
                "Pulse approaching! Get ready!",
            )),
            PulseEvent::WindowOpened { is_rare_tier: true, .. } => Some(Self::new(
                NoticeKind::Success,
                "SUPER PULSE ACTIVE! (3 credits)",
            )),
            PulseEvent::WindowOpened { .. } => {
                Some(Self::new(NoticeKind::Success, "Pulse active! (1 credit)"))
            }
            PulseEvent::WindowClosed { was_captured: false, .. } => {
                Some(Self::new(NoticeKind::Error, "Pulse opportunity missed!"))
            }
            _ => None,
        }
    }

    pub fn for_attempt(attempt: &CaptureAttempt) -> Self {
        match attempt.outcome {
            CaptureOutcome::Accepted => match attempt.tier {
                Some(Tier::Rare) => Self::new(
                    NoticeKind::Success,
                    "Super Pulse captured! Outstanding move! (3 credits used)",
                ),
                _ => Self::new(
                    NoticeKind::Success,
                    "Pulse captured successfully! (1 credit used)",
                ),
            },
            CaptureOutcome::RejectedInsufficientBalance => Self::new(
                NoticeKind::Error,
                format!("Not enough credits! You need {} credits.", attempt.cost),
            ),
            CaptureOutcome::RejectedAlreadyCaptured => {
                Self::new(NoticeKind::Info, "Pulse already captured.")
            }
            CaptureOutcome::RejectedNotOpen => {
                Self::new(NoticeKind::Info, "No pulse is active right now.")
            }
        }
    }

    pub fn for_credit(amount: u64) -> Self {
        Self::new(
            NoticeKind::Success,
            format!("{} credits purchased successfully!", amount),
        )
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.as_str(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(outcome: CaptureOutcome, tier: Option<Tier>, cost: u64) -> CaptureAttempt {
        CaptureAttempt {
            outcome,
            tier,
            cost,
            window_id: 1,
            balance_after: 0,
        }
    }

    #[test]
    fn test_event_notices() {
        let rare = PulseEvent::WindowOpened { window_id: 1, is_rare_tier: true, window_duration: 30 };
        let notice = Notice::for_event(&rare).unwrap();
        assert_eq!(notice.kind, NoticeKind::Success);
        assert_eq!(notice.message, "SUPER PULSE ACTIVE! (3 credits)");
        assert_eq!(notice.duration_ms, 3000);

        let missed = PulseEvent::WindowClosed { window_id: 1, was_captured: false, is_rare_tier: false };
        assert_eq!(Notice::for_event(&missed).unwrap().kind, NoticeKind::Error);

        let captured = PulseEvent::WindowClosed { window_id: 1, was_captured: true, is_rare_tier: false };
        assert!(Notice::for_event(&captured).is_none());
        assert!(Notice::for_event(&PulseEvent::CountdownStarted { remaining: 5 }).is_none());
    }

    #[test]
    fn test_attempt_notices() {
        let short = attempt(CaptureOutcome::RejectedInsufficientBalance, Some(Tier::Rare), 3);
        assert_eq!(
            Notice::for_attempt(&short).message,
            "Not enough credits! You need 3 credits."
        );
        let super_pulse = attempt(CaptureOutcome::Accepted, Some(Tier::Rare), 3);
        assert!(Notice::for_attempt(&super_pulse).message.starts_with("Super Pulse captured!"));
        let idle = attempt(CaptureOutcome::RejectedNotOpen, None, 0);
        assert_eq!(Notice::for_attempt(&idle).kind, NoticeKind::Info);
    }

    #[test]
    fn test_credit_notice_display() {
        assert_eq!(
            Notice::for_credit(10).to_string(),
            "[success] 10 credits purchased successfully!"
        );
    }
}
