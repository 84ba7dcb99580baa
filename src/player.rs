use serde::{Deserialize, Serialize};

use crate::event::EngineError;
use crate::rules::Role;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfluenceCard {
    pub role: Role,
    pub revealed: bool,
}

impl InfluenceCard {
    pub fn hidden(role: Role) -> Self {
        Self { role, revealed: false }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub cash: u32,
    pub influence: [InfluenceCard; 2],
}

impl Player {
    pub fn new(cash: u32, roles: [Role; 2]) -> Self {
        Self {
            cash,
            influence: [InfluenceCard::hidden(roles[0]), InfluenceCard::hidden(roles[1])],
        }
    }

    pub fn count_unrevealed(&self) -> usize {
        self.influence.iter().filter(|card| !card.revealed).count()
    }

    pub fn has_n_unrevealed(&self, n: usize) -> bool {
        self.count_unrevealed() == n
    }

    pub fn is_dead(&self) -> bool {
        self.count_unrevealed() == 0
    }

    pub fn has_unrevealed_role(&self, role: Role) -> bool {
        self.influence.iter().any(|card| !card.revealed && card.role == role)
    }

    pub fn first_unrevealed_role(&self) -> Option<Role> {
        self.influence.iter().find(|card| !card.revealed).map(|card| card.role)
    }

    pub fn adjust_cash(&mut self, delta: i64) -> Result<(), EngineError> {
        let next = i64::from(self.cash) + delta;
        if next < 0 {
            return Err(EngineError::invariant("cash would go negative"));
        }
        self.cash = next as u32;
        Ok(())
    }

    // flips the first face-down card of that role face-up
    pub fn reveal_role(&mut self, role: Role) -> Result<(), EngineError> {
        match self.influence.iter_mut().find(|card| !card.revealed && card.role == role) {
            Some(card) => {
                card.revealed = true;
                Ok(())
            }
            None => Err(EngineError::invariant("no unrevealed card of that role to reveal")),
        }
    }

    // inverse of reveal_role, used only while replacing a proven claim
    pub fn unreveal_role(&mut self, role: Role) -> Result<(), EngineError> {
        match self.influence.iter_mut().find(|card| card.revealed && card.role == role) {
            Some(card) => {
                card.revealed = false;
                Ok(())
            }
            None => Err(EngineError::invariant("no revealed card of that role to restore")),
        }
    }

    pub fn swap_role(&mut self, old: Role, new: Role) -> Result<(), EngineError> {
        match self.influence.iter_mut().find(|card| !card.revealed && card.role == old) {
            Some(card) => {
                card.role = new;
                Ok(())
            }
            None => Err(EngineError::invariant("no unrevealed card of that role to swap")),
        }
    }
}
