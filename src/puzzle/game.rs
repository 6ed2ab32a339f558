use rand::rngs::ThreadRng;
use rand::seq::SliceRandom;
use rand::Rng;

use super::direction::Direction;
use super::grid::Grid;
use crate::utils::prelude::*;

/// Picks an empty cell and a tile value to drop into it. The production implementation
/// samples uniformly among empty cells and biases the tile toward "4" with probability `p4`.
pub trait Spawner {
    fn spawn(&mut self, grid: &mut Grid) -> Result<()>;
}

/// The production spawner: a thread-local RNG biased by `p4`.
pub struct RngSpawner<R: Rng> {
    rng: R,
    p4: f64,
}

impl RngSpawner<ThreadRng> {
    pub fn new(p4: f64) -> RngSpawner<ThreadRng> {
        RngSpawner { rng: rand::thread_rng(), p4 }
    }
}

impl<R: Rng> RngSpawner<R> {
    pub fn with_rng(rng: R, p4: f64) -> RngSpawner<R> {
        RngSpawner { rng, p4 }
    }
}

impl<R: Rng> Spawner for RngSpawner<R> {
    fn spawn(&mut self, grid: &mut Grid) -> Result<()> {
        let empties: Vec<(usize, usize)> = (0..grid.n())
            .flat_map(|r| (0..grid.n()).map(move |c| (r, c)))
            .filter(|&(r, c)| grid.is_empty(r, c))
            .collect();
        let &(r, c) = empties
            .choose(&mut self.rng)
            .ok_or_else(|| anyhow!("no empty cell to spawn a tile into"))?;
        let tile = if self.rng.gen_bool(self.p4) { 2 } else { 1 };
        grid.write_tile(r, c, tile);
        Ok(())
    }
}

/// A playable game of side `N`: a grid, a running score, and game-over tracking. This is
/// the "random spawner" collaborator described as external to the tablebase core; it
/// consumes only `Grid::swipe`/`Grid::has_moves`, never the store.
pub struct Game<const N: usize> {
    grid: Grid,
    score: u64,
    game_over: bool,
    spawner: Box<dyn Spawner>,
}

impl<const N: usize> Game<N> {
    pub fn new(p4: f64) -> Result<Game<N>> {
        let mut grid = Grid::new(N);
        let mut spawner: Box<dyn Spawner> = Box::new(RngSpawner::new(p4));
        spawner.spawn(&mut grid)?;
        Ok(Game { grid, score: 0, game_over: false, spawner })
    }

    /// Builds a game with a caller-supplied spawner, for deterministic tests.
    pub fn with_spawner(spawner: Box<dyn Spawner>) -> Result<Game<N>> {
        let mut grid = Grid::new(N);
        let mut spawner = spawner;
        spawner.spawn(&mut grid)?;
        Ok(Game { grid, score: 0, game_over: false, spawner })
    }

    pub fn reset(&mut self, p4: f64) -> Result<()> {
        self.grid = Grid::new(N);
        self.score = 0;
        self.game_over = false;
        self.spawner = Box::new(RngSpawner::new(p4));
        self.spawner.spawn(&mut self.grid)
    }

    pub fn swipe(&mut self, dir: Direction) -> Result<()> {
        if self.game_over {
            return Err(anyhow!("cannot swipe: the game is already over"));
        }
        let mut next = self.grid.clone();
        let delta = next.swipe(dir);
        if next != self.grid {
            self.grid = next;
            self.score += delta;
            self.spawner.spawn(&mut self.grid)?;
            self.game_over = !self.grid.has_moves();
        }
        Ok(())
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A spawner that always places a fixed tile at a fixed coordinate, for deterministic tests.
    struct FixedSpawner {
        coord: (usize, usize),
        tile: u32,
    }

    impl Spawner for FixedSpawner {
        fn spawn(&mut self, grid: &mut Grid) -> Result<()> {
            if !grid.is_empty(self.coord.0, self.coord.1) {
                return Err(anyhow!("fixed spawn cell already occupied"));
            }
            grid.write_tile(self.coord.0, self.coord.1, self.tile);
            Ok(())
        }
    }

    #[test]
    fn swipe_that_changes_the_board_spawns_and_scores() {
        // initial spawn at (0,1); swiping left moves it to (0,0), which changes the board
        // and must trigger a new spawn at (1,1).
        let mut game: Game<2> = Game::with_spawner(Box::new(FixedSpawner { coord: (0, 1), tile: 1 })).unwrap();
        game.spawner = Box::new(FixedSpawner { coord: (1, 1), tile: 1 });
        game.swipe(Direction::Left).unwrap();
        assert_eq!(game.grid().read_tile(0, 0), 1);
        assert_eq!(game.grid().read_tile(1, 1), 1);
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn swipe_that_does_not_change_the_board_does_not_spawn() {
        // initial spawn at (0,1): already the stable state for a rightward swipe, so
        // swiping right must be a no-op and must not invoke the spawner (which would
        // error out: no empty cell is configured as its fixed target).
        let mut game: Game<2> = Game::with_spawner(Box::new(FixedSpawner { coord: (0, 1), tile: 1 })).unwrap();
        game.spawner = Box::new(FixedSpawner { coord: (9, 9), tile: 1 });
        let before = game.grid().clone();
        game.swipe(Direction::Right).unwrap();
        assert_eq!(*game.grid(), before);
    }
}
