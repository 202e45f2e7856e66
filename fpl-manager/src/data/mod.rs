pub mod fixtures;
pub mod join;
