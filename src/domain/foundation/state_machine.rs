//! State machine trait for status enums.
//!
//! Payment and provider-transaction lifecycles both implement this so that
//! every status change goes through the same validated path.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors define valid state transitions and get validated
/// transition methods for free.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// States from which `target` can be reached in one step.
    ///
    /// Used by stores to express a transition as a compare-and-set.
    fn predecessors_of(target: Self, all: &[Self]) -> Vec<Self> {
        all.iter()
            .copied()
            .filter(|s| s.can_transition_to(&target))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestStatus {
        Draft,
        Active,
        Closed,
    }

    impl StateMachine for TestStatus {
        fn can_transition_to(&self, target: &Self) -> bool {
            use TestStatus::*;
            matches!((self, target), (Draft, Active) | (Active, Closed) | (Draft, Closed))
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use TestStatus::*;
            match self {
                Draft => vec![Active, Closed],
                Active => vec![Closed],
                Closed => vec![],
            }
        }
    }

    const ALL: [TestStatus; 3] = [TestStatus::Draft, TestStatus::Active, TestStatus::Closed];

    #[test]
    fn transition_to_fails_for_invalid_transition() {
        assert!(TestStatus::Closed.transition_to(TestStatus::Active).is_err());
        assert_eq!(
            TestStatus::Draft.transition_to(TestStatus::Active),
            Ok(TestStatus::Active)
        );
    }

    #[test]
    fn is_terminal_only_for_closed() {
        assert!(TestStatus::Closed.is_terminal());
        assert!(!TestStatus::Active.is_terminal());
    }

    #[test]
    fn predecessors_lists_every_source_state() {
        assert_eq!(
            TestStatus::predecessors_of(TestStatus::Closed, &ALL),
            vec![TestStatus::Draft, TestStatus::Active]
        );
        assert!(TestStatus::predecessors_of(TestStatus::Draft, &ALL).is_empty());
    }
}
