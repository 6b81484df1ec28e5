pub mod config;
pub mod error;
pub mod index_store;
pub mod stats;
pub mod transaction;
pub mod types;
pub mod registry;
