use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-store index statistics for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub store: String,
    pub generation: u64,
    pub segments: usize,
    pub documents: usize,
    pub live_documents: usize,
    pub deleted_documents: usize,
    pub pending_backlog: usize,
    pub in_doubt_deltas: usize,
    pub last_commit: Option<DateTime<Utc>>,
}

/// Coordinator-wide transaction counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorStats {
    pub open_stores: usize,
    pub active: usize,
    pub suspended: usize,
    pub prepared: usize,
    pub in_doubt: usize,
}
