pub mod config;
pub mod error;
pub mod merge;
pub mod types;

pub use config::{Config, RunSettings};
pub use error::WindfallError;
pub use types::*;
