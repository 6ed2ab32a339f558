pub mod engine;
pub mod store;

pub mod prelude {
    pub use super::engine::{RecursiveStep, TablebaseEngine};
    pub use super::store::prelude::*;
}
