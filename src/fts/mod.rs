pub mod backlog;
pub mod scheduler;
