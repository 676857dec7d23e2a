pub mod extract;
pub mod generator;
pub mod registry;
pub mod writer;
