pub mod deck;
pub mod event;
pub mod explore;
pub mod machine;
pub mod player;
pub mod rng;
pub mod rules;

pub use deck::Deck;
pub use event::{EngineError, Event};
pub use explore::{generate_graph, GraphEdge, GraphNode, SimParams};
pub use machine::{initial_state, Config, Context, Game, Phase, PlayerStart};
pub use player::{InfluenceCard, Player};
pub use rng::{GameRng, Seed};
pub use rules::{ActionName, ActionSpec, GameDef, Role};
