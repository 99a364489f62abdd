pub mod fixtures;
pub mod scenarios;

pub use fixtures::*;
