use std::collections::{HashMap, VecDeque};

use super::{Edge, GraphStore, NodeScores};
use crate::puzzle::prelude::Grid;
use crate::utils::prelude::*;

/// A `HashMap`/`VecDeque`-backed store, entirely resident in memory. Fast and simple;
/// the obvious choice for small boards (`n=2`, `n=3`) where the full graph fits in RAM.
#[derive(Default)]
pub struct InMemoryStore {
    scores: HashMap<Grid, NodeScores>,
    insertion_order: Vec<Grid>,
    forward: HashMap<Grid, Vec<Edge>>,
    reverse: HashMap<Grid, Vec<Grid>>,
    edge_queue: VecDeque<(Grid, u32)>,
    score_queue: VecDeque<Grid>,
    flags: HashMap<String, bool>,
}

impl InMemoryStore {
    pub fn new() -> InMemoryStore {
        InMemoryStore::default()
    }
}

impl GraphStore for InMemoryStore {
    fn get_or_insert_node(&mut self, grid: &Grid) -> Result<NodeScores> {
        if let Some(&scores) = self.scores.get(grid) {
            return Ok(scores);
        }
        let scores = NodeScores::unknown();
        self.scores.insert(grid.clone(), scores);
        self.insertion_order.push(grid.clone());
        Ok(scores)
    }

    fn node_scores(&self, grid: &Grid) -> Result<Option<NodeScores>> {
        Ok(self.scores.get(grid).copied())
    }

    fn set_node_scores(&mut self, grid: &Grid, scores: NodeScores) -> Result<()> {
        self.scores.insert(grid.clone(), scores);
        Ok(())
    }

    fn add_edge(&mut self, from: &Grid, edge: Edge) -> Result<()> {
        self.reverse.entry(edge.to.clone()).or_default().push(from.clone());
        self.forward.entry(from.clone()).or_default().push(edge);
        Ok(())
    }

    fn edges_from(&self, grid: &Grid) -> Result<Vec<Edge>> {
        Ok(self.forward.get(grid).cloned().unwrap_or_default())
    }

    fn parents_of(&self, grid: &Grid) -> Result<Vec<Grid>> {
        Ok(self.reverse.get(grid).cloned().unwrap_or_default())
    }

    fn push_edge_queue(&mut self, grid: &Grid, depth: u32) -> Result<()> {
        self.edge_queue.push_back((grid.clone(), depth));
        Ok(())
    }

    fn pop_edge_queue(&mut self) -> Result<Option<(Grid, u32)>> {
        Ok(self.edge_queue.pop_front())
    }

    fn push_score_queue(&mut self, grid: &Grid) -> Result<()> {
        self.score_queue.push_back(grid.clone());
        Ok(())
    }

    fn pop_score_queue(&mut self) -> Result<Option<Grid>> {
        Ok(self.score_queue.pop_front())
    }

    fn edge_queue_is_empty(&self) -> Result<bool> {
        Ok(self.edge_queue.is_empty())
    }

    fn score_queue_is_empty(&self) -> Result<bool> {
        Ok(self.score_queue.is_empty())
    }

    fn all_nodes(&self) -> Result<Vec<Grid>> {
        Ok(self.insertion_order.clone())
    }

    fn node_count(&self) -> Result<u64> {
        Ok(self.scores.len() as u64)
    }

    fn get_flag(&self, name: &str) -> Result<bool> {
        Ok(self.flags.get(name).copied().unwrap_or(false))
    }

    fn set_flag(&mut self, name: &str, value: bool) -> Result<()> {
        self.flags.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_insert_is_idempotent() {
        let mut store = InMemoryStore::new();
        let grid = Grid::new(2);
        let first = store.get_or_insert_node(&grid).unwrap();
        assert_eq!(first, NodeScores::unknown());
        store.set_node_scores(&grid, NodeScores { s_final: 3.0, s_inter: 1.5 }).unwrap();
        let second = store.get_or_insert_node(&grid).unwrap();
        assert_eq!(second, NodeScores { s_final: 3.0, s_inter: 1.5 });
        assert_eq!(store.node_count().unwrap(), 1);
    }

    #[test]
    fn edges_and_reverse_index_agree() {
        let mut store = InMemoryStore::new();
        let a = Grid::new(2);
        let mut b = Grid::new(2);
        b.write_tile(0, 0, 1);

        store.add_edge(&a, Edge::spawn(b.clone(), 1.0)).unwrap();
        assert_eq!(store.edges_from(&a).unwrap().len(), 1);
        assert_eq!(store.parents_of(&b).unwrap(), vec![a.clone()]);
        assert!(store.edges_from(&b).unwrap().is_empty());
    }

    #[test]
    fn queues_are_fifo() {
        let mut store = InMemoryStore::new();
        let mut g1 = Grid::new(2);
        g1.write_tile(0, 0, 1);
        let mut g2 = Grid::new(2);
        g2.write_tile(0, 0, 2);

        store.push_edge_queue(&g1, 0).unwrap();
        store.push_edge_queue(&g2, 1).unwrap();
        assert_eq!(store.pop_edge_queue().unwrap(), Some((g1, 0)));
        assert_eq!(store.pop_edge_queue().unwrap(), Some((g2, 1)));
        assert_eq!(store.pop_edge_queue().unwrap(), None);
    }

    #[test]
    fn all_nodes_preserves_insertion_order() {
        let mut store = InMemoryStore::new();
        let mut grids = Vec::new();
        for t in 1..=3 {
            let mut g = Grid::new(2);
            g.write_tile(0, 0, t);
            store.get_or_insert_node(&g).unwrap();
            grids.push(g);
        }
        assert_eq!(store.all_nodes().unwrap(), grids);
    }
}
