pub mod decision;
pub mod payload;
