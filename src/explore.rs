// random-walk exploration of the reachable state space

use petgraph::graph::NodeIndex;
use petgraph::prelude::StableGraph;
use petgraph::Directed;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use crate::event::{EngineError, Event};
use crate::machine::Game;
use crate::rules::GameDef;

#[derive(Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub sim: usize,
    pub step: usize,
    pub state: Game,
}

#[derive(Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub count: usize,
    pub event: Event,
}

pub struct SimParams {
    pub seed: u64,
    pub num_sims: usize,
    pub num_players: usize,
    pub max_steps: usize,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            seed: 0,
            num_sims: 1,
            num_players: 3,
            max_steps: 200,
        }
    }
}

fn add_state_to_graph(
    graph: &mut StableGraph<GraphNode, GraphEdge, Directed>,
    nodes: &mut Vec<(NodeIndex, GraphNode)>,
    game: &Game,
    sim: usize,
    step: usize,
) -> NodeIndex {
    let node = GraphNode {
        sim,
        step,
        state: game.clone(),
    };

    let node_index = {
        let existing = nodes.iter().find(|n| n.1.state == node.state);
        if let Some(existing) = existing {
            existing.0
        } else {
            graph.add_node(node.clone())
        }
    };

    nodes.push((node_index, node));

    node_index
}

fn add_event_to_graph(
    graph: &mut StableGraph<GraphNode, GraphEdge, Directed>,
    event: Event,
    prev_state_idx: NodeIndex,
    new_state_idx: NodeIndex,
) {
    let existing_edge = graph.find_edge(prev_state_idx, new_state_idx);
    if let Some(existing_edge) = existing_edge {
        let count = graph
            .edge_weight(existing_edge)
            .map(|edge| edge.count)
            .unwrap_or(0);
        graph.update_edge(prev_state_idx, new_state_idx, GraphEdge { event, count: count + 1 });
    } else {
        graph.add_edge(prev_state_idx, new_state_idx, GraphEdge { event, count: 1 });
    }
}

/// Deal fresh games and walk them with uniformly random legal events,
/// merging identical states into a single graph node.
pub fn generate_graph(
    params: SimParams,
) -> Result<StableGraph<GraphNode, GraphEdge, Directed>, EngineError> {
    let mut graph: StableGraph<GraphNode, GraphEdge, Directed> = StableGraph::new();
    let mut nodes: Vec<(NodeIndex, GraphNode)> = Vec::new();

    for sim_n in 0..params.num_sims {
        let mut rng = Pcg64::seed_from_u64(params.seed.wrapping_add(sim_n as u64));
        let mut game = Game::deal(
            GameDef::standard(),
            params.num_players,
            [rng.gen(), rng.gen(), rng.gen(), rng.gen()],
        )?;

        let mut step = 0usize;
        let mut prev_idx = add_state_to_graph(&mut graph, &mut nodes, &game, sim_n, step);

        while game.winner().is_none() && step < params.max_steps {
            let events = game.legal_events();
            let event = events[rng.gen_range(0..events.len())];

            game = game.transition(&event)?;
            step += 1;

            let new_idx = add_state_to_graph(&mut graph, &mut nodes, &game, sim_n, step);
            add_event_to_graph(&mut graph, event, prev_idx, new_idx);
            prev_idx = new_idx;
        }
    }

    Ok(graph)
}
