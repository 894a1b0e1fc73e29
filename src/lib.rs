pub mod cli;
pub mod config;
pub mod damage;
pub mod data;
pub mod error;
pub mod export;
pub mod hazard;
pub mod job;
pub mod parallel;
pub mod stats;

pub use error::{QuakeError, Result};
