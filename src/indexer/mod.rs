pub mod command;
pub mod delta;
pub mod generator;
pub mod properties;
