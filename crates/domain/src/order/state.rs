//! Order state machine.

use serde::{Deserialize, Serialize};

use super::OrderError;

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Unsubmitted ──submit──► Processing ──ship──► Shipped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Lines can be added and removed.
    #[default]
    Unsubmitted,

    /// Submitted; the line list is locked.
    Processing,

    /// Dispatched (terminal state).
    Shipped,
}

/// An action that moves an order to another state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderTransition {
    Submit,
    Ship,
}

impl OrderTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderTransition::Submit => "submit",
            OrderTransition::Ship => "ship",
        }
    }
}

impl OrderState {
    /// Looks up the state reached by `transition`.
    ///
    /// This table is the only place that decides which transitions exist.
    pub fn transition(self, transition: OrderTransition) -> Result<OrderState, OrderError> {
        match (self, transition) {
            (OrderState::Unsubmitted, OrderTransition::Submit) => Ok(OrderState::Processing),
            (OrderState::Processing, OrderTransition::Ship) => Ok(OrderState::Shipped),
            (current_state, transition) => Err(OrderError::InvalidStateTransition {
                current_state,
                action: transition.as_str(),
            }),
        }
    }

    /// Returns true if lines can be added or removed in this state.
    pub fn can_modify_lines(&self) -> bool {
        matches!(self, OrderState::Unsubmitted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Unsubmitted => "unsubmitted",
            OrderState::Processing => "processing",
            OrderState::Shipped => "shipped",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [OrderState; 3] = [
        OrderState::Unsubmitted,
        OrderState::Processing,
        OrderState::Shipped,
    ];

    #[test]
    fn test_default_state_is_unsubmitted() {
        assert_eq!(OrderState::default(), OrderState::Unsubmitted);
    }

    #[test]
    fn test_allowed_transitions() {
        assert_eq!(
            OrderState::Unsubmitted
                .transition(OrderTransition::Submit)
                .unwrap(),
            OrderState::Processing
        );
        assert_eq!(
            OrderState::Processing
                .transition(OrderTransition::Ship)
                .unwrap(),
            OrderState::Shipped
        );
    }

    #[test]
    fn test_every_other_transition_is_rejected() {
        let allowed = [
            (OrderState::Unsubmitted, OrderTransition::Submit),
            (OrderState::Processing, OrderTransition::Ship),
        ];

        for state in ALL_STATES {
            for transition in [OrderTransition::Submit, OrderTransition::Ship] {
                if allowed.contains(&(state, transition)) {
                    continue;
                }
                let err = state.transition(transition).unwrap_err();
                assert!(matches!(
                    err,
                    OrderError::InvalidStateTransition { current_state, action }
                        if current_state == state && action == transition.as_str()
                ));
            }
        }
    }

    #[test]
    fn test_only_unsubmitted_can_modify_lines() {
        assert!(OrderState::Unsubmitted.can_modify_lines());
        assert!(!OrderState::Processing.can_modify_lines());
        assert!(!OrderState::Shipped.can_modify_lines());
    }

    #[test]
    fn test_display() {
        assert_eq!(OrderState::Unsubmitted.to_string(), "unsubmitted");
        assert_eq!(OrderState::Processing.to_string(), "processing");
        assert_eq!(OrderState::Shipped.to_string(), "shipped");
    }

    #[test]
    fn test_serialization_matches_display() {
        let json = serde_json::to_string(&OrderState::Processing).unwrap();
        assert_eq!(json, "\"processing\"");

        let state: OrderState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, OrderState::Processing);
    }
}
