pub mod document;
pub mod inverted;
