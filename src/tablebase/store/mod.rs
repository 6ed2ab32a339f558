pub mod memory;
pub mod sqlite;

use crate::puzzle::prelude::Grid;
use crate::utils::prelude::*;

/// Sentinel for "not yet computed". The recurrence never produces a negative score, so
/// exact float equality against this constant is safe.
pub const UNKNOWN: f32 = -1.0;

/// Sentinel edge weight marking a deterministic swipe edge (pre-move -> post-move).
/// Spawn edges (post-move -> pre-move) carry their real transition probability in
/// `[0, 1]` instead. This mirrors the persisted schema bit-for-bit: a single `weight`
/// column distinguishes the two edge kinds by sign, exactly as specified.
pub const SWIPE_WEIGHT: f32 = -1.0;

/// A directed edge between two grid states.
#[derive(Clone, Debug, PartialEq)]
pub struct Edge {
    pub to: Grid,
    pub weight: f32,
}

impl Edge {
    pub fn swipe(to: Grid) -> Edge {
        Edge { to, weight: SWIPE_WEIGHT }
    }

    pub fn spawn(to: Grid, weight: f32) -> Edge {
        Edge { to, weight }
    }

    pub fn is_spawn(&self) -> bool {
        self.weight >= 0.0
    }
}

/// The two-slot score record carried per node: `s_final` is the score of the node
/// immediately after a spawn (an opponent-facing, to-move-by-player position) and
/// `s_inter` is the score of the node immediately after a swipe (a to-spawn position).
/// Splitting the node into these two slots breaks the cyclic dependency between
/// pre-move and post-move scores that a single-slot scheme cannot represent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeScores {
    pub s_final: f32,
    pub s_inter: f32,
}

impl NodeScores {
    pub fn unknown() -> NodeScores {
        NodeScores { s_final: UNKNOWN, s_inter: UNKNOWN }
    }
}

/// Storage backend for the tablebase graph: nodes (grids with their two-slot scores),
/// forward edges, and the two work queues (`edge_queue` for phase-1 BFS expansion,
/// `score_queue` for phase-2 retrograde propagation).
///
/// Kept object-safe (no generic methods) so CLI code can pick a backend at runtime
/// behind `Box<dyn GraphStore>` while [`crate::tablebase::engine::TablebaseEngine`]
/// stays a zero-cost generic over a concrete store type for library callers.
pub trait GraphStore {
    /// Registers a node if absent; returns its current scores (unknown if new).
    fn get_or_insert_node(&mut self, grid: &Grid) -> Result<NodeScores>;

    fn node_scores(&self, grid: &Grid) -> Result<Option<NodeScores>>;

    fn set_node_scores(&mut self, grid: &Grid, scores: NodeScores) -> Result<()>;

    /// Records a forward edge `from -> edge.to` and its reverse index entry.
    fn add_edge(&mut self, from: &Grid, edge: Edge) -> Result<()>;

    fn edges_from(&self, grid: &Grid) -> Result<Vec<Edge>>;

    /// Nodes with a forward edge landing on `grid` (the retrograde parent set).
    fn parents_of(&self, grid: &Grid) -> Result<Vec<Grid>>;

    fn push_edge_queue(&mut self, grid: &Grid, depth: u32) -> Result<()>;

    fn pop_edge_queue(&mut self) -> Result<Option<(Grid, u32)>>;

    fn push_score_queue(&mut self, grid: &Grid) -> Result<()>;

    fn pop_score_queue(&mut self) -> Result<Option<Grid>>;

    fn edge_queue_is_empty(&self) -> Result<bool>;

    fn score_queue_is_empty(&self) -> Result<bool>;

    /// All nodes ever inserted, in insertion order (used to seed the score queue).
    fn all_nodes(&self) -> Result<Vec<Grid>>;

    fn node_count(&self) -> Result<u64>;

    /// Opens a transaction wrapping one `partial_init` batch's writes, per the
    /// durability contract: a crash mid-batch loses only the in-flight batch's rows.
    /// No-op for backends without a meaningful notion of a transaction.
    fn begin_batch(&mut self) -> Result<()> {
        Ok(())
    }

    /// Commits the transaction opened by `begin_batch`, if any.
    fn commit_batch(&mut self) -> Result<()> {
        Ok(())
    }

    /// One-shot seeding flags (`edge_queue_init`, `score_queue_init` per the persisted
    /// `config` table); default `false` until explicitly set.
    fn get_flag(&self, name: &str) -> Result<bool>;

    fn set_flag(&mut self, name: &str, value: bool) -> Result<()>;
}

impl<T: GraphStore + ?Sized> GraphStore for Box<T> {
    fn get_or_insert_node(&mut self, grid: &Grid) -> Result<NodeScores> {
        (**self).get_or_insert_node(grid)
    }

    fn node_scores(&self, grid: &Grid) -> Result<Option<NodeScores>> {
        (**self).node_scores(grid)
    }

    fn set_node_scores(&mut self, grid: &Grid, scores: NodeScores) -> Result<()> {
        (**self).set_node_scores(grid, scores)
    }

    fn add_edge(&mut self, from: &Grid, edge: Edge) -> Result<()> {
        (**self).add_edge(from, edge)
    }

    fn edges_from(&self, grid: &Grid) -> Result<Vec<Edge>> {
        (**self).edges_from(grid)
    }

    fn parents_of(&self, grid: &Grid) -> Result<Vec<Grid>> {
        (**self).parents_of(grid)
    }

    fn push_edge_queue(&mut self, grid: &Grid, depth: u32) -> Result<()> {
        (**self).push_edge_queue(grid, depth)
    }

    fn pop_edge_queue(&mut self) -> Result<Option<(Grid, u32)>> {
        (**self).pop_edge_queue()
    }

    fn push_score_queue(&mut self, grid: &Grid) -> Result<()> {
        (**self).push_score_queue(grid)
    }

    fn pop_score_queue(&mut self) -> Result<Option<Grid>> {
        (**self).pop_score_queue()
    }

    fn edge_queue_is_empty(&self) -> Result<bool> {
        (**self).edge_queue_is_empty()
    }

    fn score_queue_is_empty(&self) -> Result<bool> {
        (**self).score_queue_is_empty()
    }

    fn all_nodes(&self) -> Result<Vec<Grid>> {
        (**self).all_nodes()
    }

    fn node_count(&self) -> Result<u64> {
        (**self).node_count()
    }

    fn begin_batch(&mut self) -> Result<()> {
        (**self).begin_batch()
    }

    fn commit_batch(&mut self) -> Result<()> {
        (**self).commit_batch()
    }

    fn get_flag(&self, name: &str) -> Result<bool> {
        (**self).get_flag(name)
    }

    fn set_flag(&mut self, name: &str, value: bool) -> Result<()> {
        (**self).set_flag(name, value)
    }
}

pub mod prelude {
    pub use super::memory::InMemoryStore;
    pub use super::sqlite::SqliteStore;
    pub use super::{Edge, GraphStore, NodeScores, SWIPE_WEIGHT, UNKNOWN};
}
