pub mod consts;
pub mod direction;
pub mod dispatch;
pub mod game;
pub mod grid;

pub mod prelude {
    pub use super::consts::{bits_per_tile, grid_bytes, win_tile, MAX_SIZE, MIN_SIZE};
    pub use super::direction::Direction;
    pub use super::dispatch::{AnySizeGame, InvalidGameSize};
    pub use super::game::{Game, RngSpawner, Spawner};
    pub use super::grid::Grid;
}
