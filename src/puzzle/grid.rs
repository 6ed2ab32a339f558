use std::fmt;

use itertools::Itertools;

use super::consts::{bits_per_tile, grid_bytes};
use super::direction::Direction;
use crate::utils::prelude::*;

/// A fixed-width bit-packed `n x n` board of tile exponents.
///
/// Tile `t` at `(r, c)` occupies bits `[(r*n+c)*b, (r*n+c)*b + b)` of the packed buffer,
/// where `b` is [`bits_per_tile`]. `t = 0` means empty; `t >= 1` displays as `2^t`. This
/// layout is bit-exact: it is both the hash key used by the in-memory store and the `BLOB`
/// primary key persisted by the sqlite store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Grid {
    n: usize,
    bits_per_tile: u32,
    data: Vec<u8>,
}

impl Grid {
    /// An empty board of side `n`.
    pub fn new(n: usize) -> Grid {
        let bits_per_tile = bits_per_tile(n);
        Grid { n, bits_per_tile, data: vec![0u8; grid_bytes(n)] }
    }

    /// Reconstructs a grid from its packed bytes (as produced by [`Grid::as_bytes`]).
    pub fn from_bytes(n: usize, bytes: &[u8]) -> Result<Grid> {
        let expected = grid_bytes(n);
        if bytes.len() != expected {
            return Err(anyhow!(
                "grid byte buffer for n={n} must be {expected} bytes, got {}",
                bytes.len()
            ));
        }
        Ok(Grid { n, bits_per_tile: bits_per_tile(n), data: bytes.to_vec() })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// The raw packed buffer; this is the canonical on-disk/hash key.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn bit(&self, index: usize) -> bool {
        (self.data[index / 8] >> (index % 8)) & 1 == 1
    }

    fn set_bit(&mut self, index: usize, value: bool) {
        if value {
            self.data[index / 8] |= 1 << (index % 8);
        } else {
            self.data[index / 8] &= !(1 << (index % 8));
        }
    }

    fn tile_base(&self, row: usize, col: usize) -> usize {
        (row * self.n + col) * self.bits_per_tile as usize
    }

    pub fn read_tile(&self, row: usize, col: usize) -> u32 {
        let base = self.tile_base(row, col);
        let mut tile = 0u32;
        for i in 0..self.bits_per_tile {
            if self.bit(base + i as usize) {
                tile |= 1 << i;
            }
        }
        tile
    }

    pub fn write_tile(&mut self, row: usize, col: usize, tile: u32) {
        let base = self.tile_base(row, col);
        for i in 0..self.bits_per_tile {
            self.set_bit(base + i as usize, (tile >> i) & 1 == 1);
        }
    }

    pub fn is_empty(&self, row: usize, col: usize) -> bool {
        self.read_tile(row, col) == 0
    }

    pub fn num_empty_tiles(&self) -> u32 {
        let mut count = 0;
        for r in 0..self.n {
            for c in 0..self.n {
                if self.is_empty(r, c) {
                    count += 1;
                }
            }
        }
        count
    }

    pub fn has_tile(&self, tile: u32) -> bool {
        (0..self.n).any(|r| (0..self.n).any(|c| self.read_tile(r, c) == tile))
    }

    /// At least one of the four swipes changes the grid.
    pub fn has_moves(&self) -> bool {
        Direction::all().iter().any(|&dir| {
            let mut clone = self.clone();
            clone.swipe(dir);
            clone != *self
        })
    }

    /// Coordinates of line `index` (row for left/right, column for up/down), ordered from
    /// the end the swipe slides *toward* to the far end.
    fn line_coords(&self, dir: Direction, index: usize) -> Vec<(usize, usize)> {
        match dir {
            Direction::Left => (0..self.n).map(|c| (index, c)).collect(),
            Direction::Right => (0..self.n).rev().map(|c| (index, c)).collect(),
            Direction::Up => (0..self.n).map(|r| (r, index)).collect(),
            Direction::Down => (0..self.n).rev().map(|r| (r, index)).collect(),
        }
    }

    /// Slides and fuses a single line toward index 0 of `coords`. Returns the score
    /// contributed by fusions in this line. Each tile fuses at most once.
    fn slide_line(&mut self, coords: &[(usize, usize)]) -> u64 {
        let line: Vec<u32> = coords.iter().map(|&(r, c)| self.read_tile(r, c)).collect();
        let mut result = vec![0u32; line.len()];
        let mut fused = vec![false; line.len()];
        let mut write_idx = 0usize;
        let mut score = 0u64;

        for &tile in line.iter().filter(|&&t| t != 0) {
            if write_idx > 0 && result[write_idx - 1] == tile && !fused[write_idx - 1] {
                result[write_idx - 1] = tile + 1;
                fused[write_idx - 1] = true;
                score += 1u64 << (tile + 1);
            } else {
                result[write_idx] = tile;
                fused[write_idx] = false;
                write_idx += 1;
            }
        }

        for (&(r, c), &tile) in coords.iter().zip(result.iter()) {
            self.write_tile(r, c, tile);
        }
        score
    }

    /// Mutates the grid in place, applying `dir`, and returns the sum of displayed values
    /// of all tiles produced by fusions this swipe.
    pub fn swipe(&mut self, dir: Direction) -> u64 {
        let mut total = 0u64;
        for index in 0..self.n {
            let coords = self.line_coords(dir, index);
            total += self.slide_line(&coords);
        }
        total
    }

    /// Comma-separated list of tile exponents, row-major: `t00,t01,...,t{n-1,n-1}`.
    pub fn dump_compact(&self) -> String {
        (0..self.n)
            .flat_map(|r| (0..self.n).map(move |c| (r, c)))
            .map(|(r, c)| self.read_tile(r, c).to_string())
            .join(",")
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..self.n {
            for c in 0..self.n {
                let tile = self.read_tile(r, c);
                let value = if tile == 0 { 0 } else { 1u64 << tile };
                write!(f, "{value:>8}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_tile_values() {
        for n in 2..=5 {
            let win = super::super::consts::win_tile(n);
            for t in 0..=win {
                let mut grid = Grid::new(n);
                grid.write_tile(0, 0, t);
                assert_eq!(grid.read_tile(0, 0), t);
            }
        }
    }

    #[test]
    fn equal_grids_hash_equal() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut a = Grid::new(3);
        let mut b = Grid::new(3);
        a.write_tile(1, 1, 4);
        b.write_tile(1, 1, 4);
        assert_eq!(a, b);

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    fn row_grid(tiles: &[u32]) -> Grid {
        let n = tiles.len();
        let mut grid = Grid::new(n);
        for (c, &t) in tiles.iter().enumerate() {
            grid.write_tile(0, c, t);
        }
        grid
    }

    #[test]
    fn scenario_three_pair_of_pairs_left() {
        let mut grid = row_grid(&[1, 1, 2, 2]);
        let score = grid.swipe(Direction::Left);
        assert_eq!(grid.read_tile(0, 0), 2);
        assert_eq!(grid.read_tile(0, 1), 3);
        assert_eq!(grid.read_tile(0, 2), 0);
        assert_eq!(grid.read_tile(0, 3), 0);
        assert_eq!(score, 12);
    }

    #[test]
    fn scenario_four_equal_tiles_fuse_once_each() {
        let mut grid = row_grid(&[2, 2, 2, 2]);
        let score = grid.swipe(Direction::Left);
        assert_eq!(grid.read_tile(0, 0), 3);
        assert_eq!(grid.read_tile(0, 1), 3);
        assert_eq!(grid.read_tile(0, 2), 0);
        assert_eq!(grid.read_tile(0, 3), 0);
        assert_eq!(score, 16);
    }

    #[test]
    fn scenario_five_swipe_right_gap() {
        let mut grid = row_grid(&[1, 0, 1, 0]);
        let score = grid.swipe(Direction::Right);
        assert_eq!(grid.read_tile(0, 0), 0);
        assert_eq!(grid.read_tile(0, 1), 0);
        assert_eq!(grid.read_tile(0, 2), 0);
        assert_eq!(grid.read_tile(0, 3), 2);
        assert_eq!(score, 4);
    }

    #[test]
    fn swipe_determinism_and_idempotence() {
        let mut grid = row_grid(&[1, 1, 2, 2]);
        let mut again = grid.clone();
        let s1 = grid.swipe(Direction::Left);
        let s2 = again.swipe(Direction::Left);
        assert_eq!(grid, again);
        assert_eq!(s1, s2);

        let mut repeat = grid.clone();
        let s3 = repeat.swipe(Direction::Left);
        assert_eq!(repeat, grid);
        assert_eq!(s3, 0);
    }

    #[test]
    fn unchanged_grid_has_no_score() {
        let mut grid = Grid::new(4);
        grid.write_tile(0, 0, 1);
        grid.write_tile(0, 3, 3);
        let before = grid.clone();
        let score = grid.swipe(Direction::Left);
        assert_eq!(grid.read_tile(0, 0), 1);
        assert_eq!(grid.read_tile(0, 1), 3);
        assert_ne!(grid, before);
        assert_eq!(score, 0);
    }

    #[test]
    fn has_moves_false_on_locked_board() {
        // 2x2 board filled with distinct values so no swipe changes anything.
        let mut grid = Grid::new(2);
        grid.write_tile(0, 0, 1);
        grid.write_tile(0, 1, 2);
        grid.write_tile(1, 0, 3);
        grid.write_tile(1, 1, 4);
        assert!(!grid.has_moves());
    }

    #[test]
    fn empty_grid_has_no_moves_but_is_not_terminal_by_convention() {
        let grid = Grid::new(3);
        assert!(!grid.has_moves());
        assert_eq!(grid.num_empty_tiles(), 9);
    }

    #[test]
    fn has_tile_and_num_empty() {
        let mut grid = Grid::new(2);
        assert_eq!(grid.num_empty_tiles(), 4);
        grid.write_tile(0, 0, 5);
        assert!(grid.has_tile(5));
        assert_eq!(grid.num_empty_tiles(), 3);
    }

    #[test]
    fn dump_compact_is_comma_joined_row_major() {
        let mut grid = Grid::new(2);
        grid.write_tile(0, 1, 2);
        grid.write_tile(1, 0, 1);
        assert_eq!(grid.dump_compact(), "0,2,1,0");
    }
}
