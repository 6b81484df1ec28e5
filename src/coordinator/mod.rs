pub mod coordinator;
pub mod resource;
pub mod tenant;
