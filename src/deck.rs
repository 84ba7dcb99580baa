use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::event::EngineError;
use crate::rng::GameRng;
use crate::rules::Role;

/// Ordered pile of role cards, top of the pile at index 0.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck(Vec<Role>);

impl Deck {
    pub fn new(roles: Vec<Role>) -> Self {
        Self(roles)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn roles(&self) -> &[Role] {
        &self.0
    }

    pub fn push_top(&mut self, role: Role) {
        self.0.insert(0, role);
    }

    pub fn pop_top(&mut self) -> Result<Role, EngineError> {
        if self.0.is_empty() {
            return Err(EngineError::invariant("cannot draw from an empty deck"));
        }
        Ok(self.0.remove(0))
    }

    pub fn shuffle(&mut self, rng: &mut GameRng) {
        self.0.shuffle(rng);
    }

    // a returned card goes back in, the pile is shuffled, and a fresh card
    // comes out; the replacement may well be the card that just went in
    pub fn recycle(&mut self, role: Role, rng: &mut GameRng) -> Result<Role, EngineError> {
        self.push_top(role);
        self.shuffle(rng);
        self.pop_top()
    }
}
