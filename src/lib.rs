#![allow(dead_code)]

pub mod puzzle;
pub mod tablebase;
pub mod tui;
pub mod validate;

pub mod utils {
    pub mod prelude {
        pub use anyhow::{anyhow, Context, Error};
        pub type Result<T> = anyhow::Result<T, Error>;

        pub use std::collections::{HashMap, HashSet, VecDeque};
    }
}

pub mod prelude {
    pub use super::puzzle::prelude::*;
    pub use super::tablebase::prelude::*;
    pub use super::utils::prelude::*;
}
