use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Role {
    Duke,
    Assassin,
    Captain,
    Ambassador,
    Contessa,
    Inquisitor,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionName {
    Income,
    ForeignAid,
    Tax,
    Assassinate,
    Steal,
    Exchange,
    Interrogate,
    Coup,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub cost: u32,
    pub gain: Option<u32>,
    // empty means the action cannot be challenged
    pub required: Vec<Role>,
    // empty means the action cannot be blocked
    pub blockers: Vec<Role>,
    pub targeted: bool,
}

/// The static rulebook: which roles are in play, how many copies each,
/// and the per-action metadata the state machine adjudicates against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameDef {
    roles: Vec<Role>,
    copies_per_role: usize,
    actions: Vec<(ActionName, ActionSpec)>,
}

impl GameDef {
    pub fn new(roles: Vec<Role>, copies_per_role: usize, actions: Vec<(ActionName, ActionSpec)>) -> Self {
        Self { roles, copies_per_role, actions }
    }

    pub fn standard() -> Self {
        use ActionName::*;
        use Role::*;

        let table = vec![
            (Income, ActionSpec {
                cost: 0,
                gain: Some(1),
                required: vec![],
                blockers: vec![],
                targeted: false,
            }),
            (ForeignAid, ActionSpec {
                cost: 0,
                gain: Some(2),
                required: vec![],
                blockers: vec![Duke],
                targeted: false,
            }),
            (Tax, ActionSpec {
                cost: 0,
                gain: Some(3),
                required: vec![Duke],
                blockers: vec![],
                targeted: false,
            }),
            (Assassinate, ActionSpec {
                cost: 3,
                gain: None,
                required: vec![Assassin],
                blockers: vec![Contessa],
                targeted: true,
            }),
            (Steal, ActionSpec {
                cost: 0,
                gain: None,
                required: vec![Captain],
                blockers: vec![Captain, Ambassador, Inquisitor],
                targeted: true,
            }),
            (Exchange, ActionSpec {
                cost: 0,
                gain: None,
                required: vec![Ambassador, Inquisitor],
                blockers: vec![],
                targeted: false,
            }),
            (Interrogate, ActionSpec {
                cost: 0,
                gain: None,
                required: vec![Inquisitor],
                blockers: vec![],
                targeted: true,
            }),
            (Coup, ActionSpec {
                cost: 7,
                gain: None,
                required: vec![],
                blockers: vec![],
                targeted: true,
            }),
        ];

        Self {
            roles: vec![Duke, Assassin, Captain, Ambassador, Contessa],
            copies_per_role: 3,
            actions: table,
        }
    }

    pub fn spec(&self, action: ActionName) -> Option<&ActionSpec> {
        self.actions.iter().find(|(name, _)| *name == action).map(|(_, spec)| spec)
    }

    pub fn actions(&self) -> impl Iterator<Item = (ActionName, &ActionSpec)> {
        self.actions.iter().map(|(name, spec)| (*name, spec))
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_valid_action(&self, action: ActionName) -> bool {
        self.spec(action).is_some()
    }

    pub fn is_valid_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn cost(&self, action: ActionName) -> u32 {
        self.spec(action).map_or(0, |s| s.cost)
    }

    pub fn gain(&self, action: ActionName) -> Option<u32> {
        self.spec(action).and_then(|s| s.gain)
    }

    pub fn required_roles(&self, action: ActionName) -> &[Role] {
        self.spec(action).map_or(&[], |s| &s.required)
    }

    pub fn is_role_required(&self, action: ActionName) -> bool {
        !self.required_roles(action).is_empty()
    }

    pub fn blocking_roles(&self, action: ActionName) -> &[Role] {
        self.spec(action).map_or(&[], |s| &s.blockers)
    }

    pub fn is_blockable(&self, action: ActionName) -> bool {
        !self.blocking_roles(action).is_empty()
    }

    pub fn is_blocked_by(&self, action: ActionName, role: Role) -> bool {
        self.blocking_roles(action).contains(&role)
    }

    pub fn role_allows_action(&self, role: Role, action: ActionName) -> bool {
        self.required_roles(action).contains(&role)
    }

    pub fn is_targeted(&self, action: ActionName) -> bool {
        self.spec(action).is_some_and(|s| s.targeted)
    }

    pub fn make_deck(&self) -> Vec<Role> {
        self.roles
            .iter()
            .flat_map(|&role| std::iter::repeat(role).take(self.copies_per_role))
            .collect()
    }
}
