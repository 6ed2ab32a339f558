use std::io::Write;

use super::store::{Edge, GraphStore, NodeScores, UNKNOWN};
use crate::puzzle::consts::{win_tile, MAX_SIZE, MIN_SIZE};
use crate::puzzle::direction::Direction;
use crate::puzzle::grid::Grid;
use crate::utils::prelude::*;

const EDGE_QUEUE_INIT_FLAG: &str = "edge_queue_init";
const SCORE_QUEUE_INIT_FLAG: &str = "score_queue_init";

/// One step of a [`TablebaseEngine::recursive_query`] walk.
#[derive(Clone, Debug, PartialEq)]
pub struct RecursiveStep {
    pub depth: u32,
    pub grid: Grid,
    pub score: f32,
}

/// Two-phase tablebase builder and query surface, generic over the backing
/// [`GraphStore`]. Owns no game-playing state; it only ever touches the store and
/// `puzzle::grid` primitives.
pub struct TablebaseEngine<S: GraphStore> {
    store: S,
    n: usize,
    p4: f64,
}

impl<S: GraphStore> TablebaseEngine<S> {
    pub fn new(store: S, n: usize, p4: f64) -> Result<TablebaseEngine<S>> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&n) {
            return Err(anyhow!("unsupported board size {n}; valid sizes are {MIN_SIZE}..={MAX_SIZE}"));
        }
        if !(0.0..=1.0).contains(&p4) {
            return Err(anyhow!("p4 must lie in [0, 1], got {p4}"));
        }
        Ok(TablebaseEngine { store, n, p4 })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Runs the full two-phase build to completion. `max_depth = None` means unlimited.
    pub fn init(&mut self, max_depth: Option<u32>) -> Result<()> {
        while !self.partial_init(u64::MAX, max_depth)? {}
        Ok(())
    }

    /// Performs at most `max_actions` units of work (one edge-queue or score-queue pop
    /// each) and returns `true` only once the score phase has drained, i.e. the build
    /// is complete. Safe to call repeatedly to make cooperative, resumable progress.
    ///
    /// The whole batch runs inside `store.begin_batch()`/`commit_batch()`, so a backend
    /// with transactional durability (e.g. [`super::store::sqlite::SqliteStore`]) only
    /// risks the rows from the in-flight batch, never the ones from earlier calls.
    pub fn partial_init(&mut self, max_actions: u64, max_depth: Option<u32>) -> Result<bool> {
        self.store.begin_batch()?;
        let result = self.run_batch(max_actions, max_depth);
        self.store.commit_batch()?;
        result
    }

    fn run_batch(&mut self, max_actions: u64, max_depth: Option<u32>) -> Result<bool> {
        self.ensure_edge_queue_seeded()?;
        let mut spent = 0u64;
        while spent < max_actions {
            if !self.store.edge_queue_is_empty()? {
                self.edge_step(max_depth)?;
                spent += 1;
                continue;
            }
            self.ensure_score_queue_seeded()?;
            if self.store.score_queue_is_empty()? {
                return Ok(true);
            }
            self.score_step()?;
            spent += 1;
        }
        Ok(self.store.edge_queue_is_empty()? && self.store.score_queue_is_empty()?)
    }

    fn ensure_edge_queue_seeded(&mut self) -> Result<()> {
        if self.store.get_flag(EDGE_QUEUE_INIT_FLAG)? {
            return Ok(());
        }
        let empty = Grid::new(self.n);
        self.store.get_or_insert_node(&empty)?;
        self.store.push_edge_queue(&empty, 0)?;
        self.store.set_flag(EDGE_QUEUE_INIT_FLAG, true)?;
        Ok(())
    }

    fn ensure_score_queue_seeded(&mut self) -> Result<()> {
        if self.store.get_flag(SCORE_QUEUE_INIT_FLAG)? {
            return Ok(());
        }
        let mut nodes = self.store.all_nodes()?;
        nodes.reverse();
        for grid in &nodes {
            self.store.push_score_queue(grid)?;
        }
        self.store.set_flag(SCORE_QUEUE_INIT_FLAG, true)?;
        Ok(())
    }

    /// One pop-and-expand step of phase 1 (forward BFS edge generation).
    fn edge_step(&mut self, max_depth: Option<u32>) -> Result<()> {
        let Some((state, depth)) = self.store.pop_edge_queue()? else {
            return Ok(());
        };
        let within_depth = max_depth.map(|m| depth < m).unwrap_or(true);
        let empties = state.num_empty_tiles();

        if empties > 0 {
            for r in 0..self.n {
                for c in 0..self.n {
                    if !state.is_empty(r, c) {
                        continue;
                    }
                    for &tile in &[1u32, 2u32] {
                        let mut child = state.clone();
                        child.write_tile(r, c, tile);
                        let p_tile = if tile == 2 { self.p4 } else { 1.0 - self.p4 };
                        let weight = (p_tile / empties as f64) as f32;
                        self.store.add_edge(&state, Edge::spawn(child.clone(), weight))?;
                        self.maybe_enqueue_child(&child, depth, within_depth)?;
                    }
                }
            }
        }

        for dir in Direction::all() {
            let mut child = state.clone();
            child.swipe(dir);
            if child == state {
                continue;
            }
            self.store.add_edge(&state, Edge::swipe(child.clone()))?;
            self.maybe_enqueue_child(&child, depth, within_depth)?;
        }

        Ok(())
    }

    fn maybe_enqueue_child(&mut self, child: &Grid, depth: u32, within_depth: bool) -> Result<()> {
        if within_depth && self.store.node_scores(child)?.is_none() {
            self.store.get_or_insert_node(child)?;
            self.store.push_edge_queue(child, depth + 1)?;
        }
        Ok(())
    }

    /// One pop-and-propagate step of phase 2 (retrograde score fixed-point).
    fn score_step(&mut self) -> Result<()> {
        let Some(state) = self.store.pop_score_queue()? else {
            return Ok(());
        };
        let mut scores = self.store.node_scores(&state)?.unwrap_or_else(NodeScores::unknown);
        if scores.s_final != UNKNOWN && scores.s_inter != UNKNOWN {
            return Ok(());
        }

        let mut advanced = false;
        let win = win_tile(self.n);
        let empty = Grid::new(self.n);

        if state.has_tile(win) {
            scores = NodeScores { s_final: 1.0, s_inter: 1.0 };
            advanced = true;
        } else if !state.has_moves() && state != empty {
            scores = NodeScores { s_final: 0.0, s_inter: 0.0 };
            advanced = true;
        } else {
            let edges = self.store.edges_from(&state)?;
            if edges.is_empty() {
                log::warn!(
                    "tablebase: unexpected leaf with no outgoing edges (depth cutoff?): {}",
                    state.dump_compact()
                );
                scores = NodeScores { s_final: 0.5, s_inter: 0.5 };
                advanced = true;
            } else {
                if scores.s_final == UNKNOWN {
                    if let Some(best) = self.max_swipe_child_inter(&edges)? {
                        scores.s_final = best;
                        advanced = true;
                    }
                }
                if scores.s_inter == UNKNOWN {
                    if let Some(expectation) = self.spawn_child_expectation(&edges)? {
                        scores.s_inter = expectation;
                        advanced = true;
                    }
                }
            }
        }

        if !advanced {
            return Ok(());
        }

        self.store.set_node_scores(&state, scores)?;
        for parent in self.store.parents_of(&state)? {
            let parent_scores = self.store.node_scores(&parent)?.unwrap_or_else(NodeScores::unknown);
            if parent_scores.s_final == UNKNOWN || parent_scores.s_inter == UNKNOWN {
                self.store.push_score_queue(&parent)?;
            }
        }
        Ok(())
    }

    /// `max` over swipe children's `s_inter`, or `None` if some child is still unknown
    /// (deferring this branch, per the fixed-point recurrence). Zero swipe children is
    /// not deferral: the "any child is unresolved" premise is vacuously false, so this
    /// returns the max identity `0.0` (a node with no swipe children, e.g. the empty
    /// grid, is not itself a leaf and must still resolve its `s_final`).
    fn max_swipe_child_inter(&self, edges: &[Edge]) -> Result<Option<f32>> {
        let swipe_edges: Vec<&Edge> = edges.iter().filter(|e| !e.is_spawn()).collect();
        if swipe_edges.is_empty() {
            return Ok(Some(0.0));
        }
        let mut best = 0.0f32;
        for edge in &swipe_edges {
            match self.store.node_scores(&edge.to)? {
                Some(cs) if cs.s_inter != UNKNOWN => best = best.max(cs.s_inter),
                _ => return Ok(None),
            }
        }
        Ok(Some(best))
    }

    /// `Σ weight * s_final` over spawn children, or `None` if some child is still
    /// unknown. Zero spawn children (a full board still reachable via merges) returns
    /// the sum identity `0.0` for the same reason `max_swipe_child_inter` does.
    fn spawn_child_expectation(&self, edges: &[Edge]) -> Result<Option<f32>> {
        let spawn_edges: Vec<&Edge> = edges.iter().filter(|e| e.is_spawn()).collect();
        let mut total = 0.0f32;
        for edge in &spawn_edges {
            match self.store.node_scores(&edge.to)? {
                Some(cs) if cs.s_final != UNKNOWN => total += edge.weight * cs.s_final,
                _ => return Ok(None),
            }
        }
        Ok(Some(total))
    }

    /// The win probability of `grid` under optimal play, or the sentinel [`UNKNOWN`]
    /// if the tablebase has not reached this state.
    pub fn query(&self, grid: &Grid) -> Result<f32> {
        Ok(self.store.node_scores(grid)?.map(|s| s.s_final).unwrap_or(UNKNOWN))
    }

    /// The swipe direction maximizing win probability, or `None` if no swipe changes
    /// the grid. Ties break in `Left, Right, Up, Down` order.
    pub fn best_move(&self, grid: &Grid) -> Result<Option<Direction>> {
        let mut best: Option<(Direction, f32)> = None;
        for dir in Direction::all() {
            let mut child = grid.clone();
            child.swipe(dir);
            if child == *grid {
                continue;
            }
            let score = self.store.node_scores(&child)?.map(|s| s.s_inter).unwrap_or(UNKNOWN);
            let replace = match best {
                None => true,
                Some((_, b)) => score > b,
            };
            if replace {
                best = Some((dir, score));
            }
        }
        Ok(best.map(|(dir, _)| dir))
    }

    /// Walks the bipartite pre-move/post-move graph from `grid`, alternating swipe and
    /// spawn edges by depth parity, up to `max_depth` hops.
    pub fn recursive_query(&self, grid: &Grid, max_depth: u32) -> Result<Vec<RecursiveStep>> {
        let mut out = Vec::new();
        self.recursive_query_inner(grid, 0, max_depth, false, &mut out)?;
        Ok(out)
    }

    fn recursive_query_inner(
        &self,
        grid: &Grid,
        depth: u32,
        max_depth: u32,
        intermediate: bool,
        out: &mut Vec<RecursiveStep>,
    ) -> Result<()> {
        let scores = self.store.node_scores(grid)?.unwrap_or_else(NodeScores::unknown);
        let score = if intermediate { scores.s_inter } else { scores.s_final };
        out.push(RecursiveStep { depth, grid: grid.clone(), score });
        if depth >= max_depth {
            return Ok(());
        }
        for edge in self.store.edges_from(grid)? {
            let is_spawn = edge.is_spawn();
            if (!intermediate && is_spawn) || (intermediate && !is_spawn) {
                continue;
            }
            self.recursive_query_inner(&edge.to, depth + 1, max_depth, !intermediate, out)?;
        }
        Ok(())
    }

    /// Writes `grid: s_final,s_inter` for every possible grid value of this board's
    /// size, in increasing tile-vector order. Debugging/validation only: the grid
    /// space is exponential in `N`, so this is unsuitable for large boards.
    pub fn dump_all<W: Write>(&self, out: &mut W) -> Result<()> {
        let win = win_tile(self.n);
        let cells = self.n * self.n;
        let mut counters = vec![0u32; cells];

        loop {
            let mut grid = Grid::new(self.n);
            for (i, &tile) in counters.iter().enumerate() {
                grid.write_tile(i / self.n, i % self.n, tile);
            }
            let scores = self.store.node_scores(&grid)?.unwrap_or_else(NodeScores::unknown);
            writeln!(out, "{}: {},{}", grid.dump_compact(), scores.s_final, scores.s_inter)
                .context("writing dump_all line")?;

            let mut idx = cells;
            loop {
                if idx == 0 {
                    return Ok(());
                }
                idx -= 1;
                counters[idx] += 1;
                if counters[idx] > win {
                    counters[idx] = 0;
                } else {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tablebase::store::memory::InMemoryStore;
    use crate::tablebase::store::sqlite::SqliteStore;

    #[test]
    fn rejects_out_of_range_size_and_probability() {
        assert!(TablebaseEngine::new(InMemoryStore::new(), 1, 0.1).is_err());
        assert!(TablebaseEngine::new(InMemoryStore::new(), 2, 1.5).is_err());
    }

    #[test]
    fn builds_n2_table_to_completion_and_satisfies_bellman_consistency() {
        let mut engine = TablebaseEngine::new(InMemoryStore::new(), 2, 0.2).unwrap();
        engine.init(None).unwrap();

        let empty = Grid::new(2);
        let win_probability = engine.query(&empty).unwrap();
        assert!(win_probability > 0.0 && win_probability <= 1.0);

        for grid in engine.store().all_nodes().unwrap() {
            let scores = engine.store().node_scores(&grid).unwrap().unwrap();
            assert_ne!(scores.s_final, UNKNOWN);
            assert_ne!(scores.s_inter, UNKNOWN);
            assert!((0.0..=1.0).contains(&scores.s_final));
            assert!((0.0..=1.0).contains(&scores.s_inter));

            if grid.has_tile(win_tile(2)) {
                assert_eq!(scores.s_final, 1.0);
                assert_eq!(scores.s_inter, 1.0);
            } else if !grid.has_moves() && grid != empty {
                assert_eq!(scores.s_final, 0.0);
                assert_eq!(scores.s_inter, 0.0);
            } else {
                let edges = engine.store().edges_from(&grid).unwrap();
                let swipe_max = edges
                    .iter()
                    .filter(|e| !e.is_spawn())
                    .map(|e| engine.store().node_scores(&e.to).unwrap().unwrap().s_inter)
                    .fold(f32::MIN, f32::max);
                if edges.iter().any(|e| !e.is_spawn()) {
                    assert!((scores.s_final - swipe_max).abs() < 1e-6);
                }

                let spawn_edges: Vec<_> = edges.iter().filter(|e| e.is_spawn()).collect();
                if !spawn_edges.is_empty() {
                    let weight_sum: f32 = spawn_edges.iter().map(|e| e.weight).sum();
                    assert!((weight_sum - 1.0).abs() < 1e-5);
                    let expectation: f32 = spawn_edges
                        .iter()
                        .map(|e| e.weight * engine.store().node_scores(&e.to).unwrap().unwrap().s_final)
                        .sum();
                    assert!((scores.s_inter - expectation).abs() < 1e-5);
                }
            }
        }
    }

    #[test]
    fn a_board_already_at_the_win_tile_queries_to_one() {
        let mut engine = TablebaseEngine::new(InMemoryStore::new(), 2, 0.2).unwrap();
        engine.init(None).unwrap();
        let mut winning = Grid::new(2);
        winning.write_tile(0, 0, win_tile(2));
        engine.store_mut().get_or_insert_node(&winning).unwrap();
        engine.store_mut().set_node_scores(&winning, NodeScores { s_final: 1.0, s_inter: 1.0 }).unwrap();
        assert_eq!(engine.query(&winning).unwrap(), 1.0);
    }

    #[test]
    fn resumable_partial_init_matches_single_shot_init() {
        let mut stepwise = TablebaseEngine::new(InMemoryStore::new(), 2, 0.2).unwrap();
        while !stepwise.partial_init(3, None).unwrap() {}

        let mut one_shot = TablebaseEngine::new(InMemoryStore::new(), 2, 0.2).unwrap();
        one_shot.init(None).unwrap();

        let empty = Grid::new(2);
        assert_eq!(stepwise.query(&empty).unwrap(), one_shot.query(&empty).unwrap());
        assert_eq!(stepwise.store().node_count().unwrap(), one_shot.store().node_count().unwrap());
    }

    #[test]
    fn memory_and_sqlite_backends_agree_on_n2() {
        let mut memory_engine = TablebaseEngine::new(InMemoryStore::new(), 2, 0.2).unwrap();
        memory_engine.init(None).unwrap();

        let mut sqlite_engine = TablebaseEngine::new(SqliteStore::open_in_memory(2).unwrap(), 2, 0.2).unwrap();
        sqlite_engine.init(None).unwrap();

        assert_eq!(memory_engine.store().node_count().unwrap(), sqlite_engine.store().node_count().unwrap());
        for grid in memory_engine.store().all_nodes().unwrap() {
            let a = memory_engine.query(&grid).unwrap();
            let b = sqlite_engine.query(&grid).unwrap();
            assert!((a - b).abs() < 1e-6, "disagreement on {}: {a} vs {b}", grid.dump_compact());
        }
    }

    #[test]
    fn best_move_is_none_when_no_swipe_changes_the_grid() {
        let mut engine = TablebaseEngine::new(InMemoryStore::new(), 2, 0.2).unwrap();
        engine.init(None).unwrap();
        let mut locked = Grid::new(2);
        locked.write_tile(0, 0, 1);
        locked.write_tile(0, 1, 2);
        locked.write_tile(1, 0, 3);
        locked.write_tile(1, 1, 4);
        assert_eq!(engine.best_move(&locked).unwrap(), None);
    }

    #[test]
    fn recursive_query_alternates_roles_by_depth_parity() {
        let mut engine = TablebaseEngine::new(InMemoryStore::new(), 2, 0.2).unwrap();
        engine.init(None).unwrap();
        let empty = Grid::new(2);
        let steps = engine.recursive_query(&empty, 2).unwrap();
        assert_eq!(steps[0].depth, 0);
        assert!(steps.iter().any(|s| s.depth == 1));
        assert!(steps.iter().all(|s| s.depth <= 2));
    }
}
