use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::{ActionName, Role};

/// Every event names the player submitting it; the engine decides whether
/// that player is allowed to act right now.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Action { player: usize, action: ActionName, target: Option<usize> },
    Block { player: usize, role: Role },
    Challenge { player: usize },
    Allow { player: usize },
    Reveal { player: usize, role: Role },
}

impl Event {
    pub fn player(&self) -> usize {
        match *self {
            Event::Action { player, .. }
            | Event::Block { player, .. }
            | Event::Challenge { player }
            | Event::Allow { player }
            | Event::Reveal { player, .. } => player,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A guard rejected the event; the caller's state is unchanged.
    #[error("illegal event: {reason}")]
    IllegalEvent { reason: String },

    /// A mutator precondition failed despite the guards passing. Engine bug.
    #[error("invariant violation: {0}")]
    InvariantViolation(&'static str),
}

impl EngineError {
    pub(crate) fn illegal(reason: impl Into<String>) -> Self {
        EngineError::IllegalEvent { reason: reason.into() }
    }

    pub(crate) fn invariant(message: &'static str) -> Self {
        EngineError::InvariantViolation(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ActionName::Assassinate;
    use crate::rules::Role::Contessa;

    #[test]
    fn player_accessor() {
        assert_eq!(Event::Challenge { player: 2 }.player(), 2);
        assert_eq!(Event::Block { player: 1, role: Contessa }.player(), 1);
        assert_eq!(
            Event::Action { player: 0, action: Assassinate, target: Some(1) }.player(),
            0
        );
    }

    #[test]
    fn wire_round_trip() {
        let events = vec![
            Event::Action { player: 0, action: Assassinate, target: Some(1) },
            Event::Block { player: 1, role: Contessa },
            Event::Challenge { player: 0 },
            Event::Allow { player: 1 },
            Event::Reveal { player: 1, role: Contessa },
        ];

        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let back: Event = serde_json::from_str(&json).unwrap();
            assert_eq!(event, back);
        }
    }

    #[test]
    fn errors_render_their_reason() {
        let err = EngineError::illegal("player 3 is out of range");
        assert_eq!(err.to_string(), "illegal event: player 3 is out of range");

        let err = EngineError::invariant("deck is empty");
        assert_eq!(err.to_string(), "invariant violation: deck is empty");
    }
}
