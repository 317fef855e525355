pub mod column_generation;
pub mod config;
pub mod demand;
pub mod episode;
pub mod error;
pub mod lp;
pub mod placement;
pub mod pricing;
pub mod sheet;
pub mod solver;
pub mod types;

pub use error::{Error, Result};
pub use solver::{Observation, Solver};
