pub mod dictionary;
pub mod memory;
pub mod model;
