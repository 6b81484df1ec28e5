pub mod memory;
pub mod service;
