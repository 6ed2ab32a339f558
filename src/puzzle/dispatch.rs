use thiserror::Error;

use super::consts::{MAX_SIZE, MIN_SIZE};
use super::direction::Direction;
use super::game::Game;
use super::grid::Grid;
use crate::utils::prelude::*;

/// A game size outside the supported `2..=8` range.
#[derive(Debug, Error)]
#[error("unsupported board size {0}; valid sizes are {MIN_SIZE}..={MAX_SIZE}")]
pub struct InvalidGameSize(pub usize);

/// Runtime `N` &harr; compile-time generic adaptor: this is the only seam where the crate
/// needs to translate a user-chosen board size into one of the eight monomorphized
/// [`Game`] instantiations. Mirrors the original implementation's `void*`-erased
/// `createGame`/`deleteGame`/`resetGame`/... shim, expressed with an enum instead of
/// type-erased pointers.
pub enum AnySizeGame {
    S2(Game<2>),
    S3(Game<3>),
    S4(Game<4>),
    S5(Game<5>),
    S6(Game<6>),
    S7(Game<7>),
    S8(Game<8>),
}

impl std::fmt::Debug for AnySizeGame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnySizeGame").field("size", &self.size()).finish()
    }
}

impl AnySizeGame {
    pub fn is_valid_size(n: usize) -> bool {
        (MIN_SIZE..=MAX_SIZE).contains(&n)
    }

    pub fn valid_sizes() -> Vec<usize> {
        (MIN_SIZE..=MAX_SIZE).collect()
    }

    pub fn new(n: usize, p4: f64) -> Result<AnySizeGame> {
        Ok(match n {
            2 => AnySizeGame::S2(Game::new(p4)?),
            3 => AnySizeGame::S3(Game::new(p4)?),
            4 => AnySizeGame::S4(Game::new(p4)?),
            5 => AnySizeGame::S5(Game::new(p4)?),
            6 => AnySizeGame::S6(Game::new(p4)?),
            7 => AnySizeGame::S7(Game::new(p4)?),
            8 => AnySizeGame::S8(Game::new(p4)?),
            _ => return Err(InvalidGameSize(n).into()),
        })
    }

    pub fn reset(&mut self, p4: f64) -> Result<()> {
        match self {
            AnySizeGame::S2(g) => g.reset(p4),
            AnySizeGame::S3(g) => g.reset(p4),
            AnySizeGame::S4(g) => g.reset(p4),
            AnySizeGame::S5(g) => g.reset(p4),
            AnySizeGame::S6(g) => g.reset(p4),
            AnySizeGame::S7(g) => g.reset(p4),
            AnySizeGame::S8(g) => g.reset(p4),
        }
    }

    pub fn swipe(&mut self, dir: Direction) -> Result<()> {
        match self {
            AnySizeGame::S2(g) => g.swipe(dir),
            AnySizeGame::S3(g) => g.swipe(dir),
            AnySizeGame::S4(g) => g.swipe(dir),
            AnySizeGame::S5(g) => g.swipe(dir),
            AnySizeGame::S6(g) => g.swipe(dir),
            AnySizeGame::S7(g) => g.swipe(dir),
            AnySizeGame::S8(g) => g.swipe(dir),
        }
    }

    pub fn score(&self) -> u64 {
        match self {
            AnySizeGame::S2(g) => g.score(),
            AnySizeGame::S3(g) => g.score(),
            AnySizeGame::S4(g) => g.score(),
            AnySizeGame::S5(g) => g.score(),
            AnySizeGame::S6(g) => g.score(),
            AnySizeGame::S7(g) => g.score(),
            AnySizeGame::S8(g) => g.score(),
        }
    }

    pub fn is_game_over(&self) -> bool {
        match self {
            AnySizeGame::S2(g) => g.is_game_over(),
            AnySizeGame::S3(g) => g.is_game_over(),
            AnySizeGame::S4(g) => g.is_game_over(),
            AnySizeGame::S5(g) => g.is_game_over(),
            AnySizeGame::S6(g) => g.is_game_over(),
            AnySizeGame::S7(g) => g.is_game_over(),
            AnySizeGame::S8(g) => g.is_game_over(),
        }
    }

    pub fn grid(&self) -> &Grid {
        match self {
            AnySizeGame::S2(g) => g.grid(),
            AnySizeGame::S3(g) => g.grid(),
            AnySizeGame::S4(g) => g.grid(),
            AnySizeGame::S5(g) => g.grid(),
            AnySizeGame::S6(g) => g.grid(),
            AnySizeGame::S7(g) => g.grid(),
            AnySizeGame::S8(g) => g.grid(),
        }
    }

    pub fn size(&self) -> usize {
        self.grid().n()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_sizes_are_two_through_eight() {
        assert_eq!(AnySizeGame::valid_sizes(), vec![2, 3, 4, 5, 6, 7, 8]);
        assert!(AnySizeGame::is_valid_size(4));
        assert!(!AnySizeGame::is_valid_size(1));
        assert!(!AnySizeGame::is_valid_size(9));
    }

    #[test]
    fn new_rejects_out_of_range_size() {
        let err = AnySizeGame::new(9, 0.2).unwrap_err();
        assert!(err.to_string().contains("unsupported board size"));
    }

    #[test]
    fn new_dispatches_to_matching_generic_size() {
        let game = AnySizeGame::new(5, 0.2).unwrap();
        assert_eq!(game.size(), 5);
        assert_eq!(game.score(), 0);
    }
}
