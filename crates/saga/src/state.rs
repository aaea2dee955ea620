//! Saga phase machine.

use serde::{Deserialize, Serialize};

/// The phase of one saga run.
///
/// Phase transitions:
/// ```text
/// Reserving ──► Paying ──► Finalizing ──► Completed
///     │            │            │
///     └────────────┴────────────┴──► Compensating ──► Compensated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaPhase {
    /// Reserving stock item by item.
    #[default]
    Reserving,

    /// Charging the payment gateway.
    Paying,

    /// Marking the order PAID and publishing the new-order event.
    Finalizing,

    /// A step failed and recorded reservations are being released.
    Compensating,

    /// Order PAID (terminal).
    Completed,

    /// Order CANCELED after compensation (terminal).
    Compensated,
}

impl SagaPhase {
    /// Returns true if the saga may move from this phase to `next`.
    pub fn can_advance_to(&self, next: SagaPhase) -> bool {
        use SagaPhase::*;
        matches!(
            (self, next),
            (Reserving, Paying)
                | (Paying, Finalizing)
                | (Finalizing, Completed)
                | (Reserving | Paying | Finalizing, Compensating)
                | (Compensating, Compensated)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaPhase::Reserving => "Reserving",
            SagaPhase::Paying => "Paying",
            SagaPhase::Finalizing => "Finalizing",
            SagaPhase::Compensating => "Compensating",
            SagaPhase::Completed => "Completed",
            SagaPhase::Compensated => "Compensated",
        }
    }
}

impl std::fmt::Display for SagaPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_phase_is_reserving() {
        assert_eq!(SagaPhase::default(), SagaPhase::Reserving);
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(SagaPhase::Reserving.can_advance_to(SagaPhase::Paying));
        assert!(SagaPhase::Paying.can_advance_to(SagaPhase::Finalizing));
        assert!(SagaPhase::Finalizing.can_advance_to(SagaPhase::Completed));
        assert!(!SagaPhase::Reserving.can_advance_to(SagaPhase::Completed));
    }

    #[test]
    fn test_any_running_phase_can_compensate() {
        assert!(SagaPhase::Reserving.can_advance_to(SagaPhase::Compensating));
        assert!(SagaPhase::Paying.can_advance_to(SagaPhase::Compensating));
        assert!(SagaPhase::Finalizing.can_advance_to(SagaPhase::Compensating));
        assert!(!SagaPhase::Completed.can_advance_to(SagaPhase::Compensating));
        assert!(SagaPhase::Compensating.can_advance_to(SagaPhase::Compensated));
    }

    #[test]
    fn test_display() {
        assert_eq!(SagaPhase::Compensating.to_string(), "Compensating");
    }
}
