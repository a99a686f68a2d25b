pub mod cli;
pub mod commands;
pub mod error;
pub mod folded;

pub use error::{Error, Result};
