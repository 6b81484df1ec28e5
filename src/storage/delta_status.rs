use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::core::transaction::Xid;
use crate::core::types::NodeRef;
use crate::storage::segment::SegmentId;

/// Lifecycle state of a delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaStatus {
    Active,
    /// A failure occurred; only rollback is accepted
    MarkedRollback,
    Preparing,
    Prepared,
    Committing,
    Committed,
    RollingBack,
    RolledBack,
}

impl DeltaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaStatus::Active => "ACTIVE",
            DeltaStatus::MarkedRollback => "MARKED_ROLLBACK",
            DeltaStatus::Preparing => "PREPARING",
            DeltaStatus::Prepared => "PREPARED",
            DeltaStatus::Committing => "COMMITTING",
            DeltaStatus::Committed => "COMMITTED",
            DeltaStatus::RollingBack => "ROLLINGBACK",
            DeltaStatus::RolledBack => "ROLLEDBACK",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeltaStatus::Committed | DeltaStatus::RolledBack)
    }
}

impl std::fmt::Display for DeltaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable description of a prepared delta; enough to finish the commit
/// after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaStatusRecord {
    pub delta_id: String,
    pub status: DeltaStatus,
    pub xid: Option<Xid>,
    pub segment: Option<SegmentId>,
    pub document_count: usize,
    pub leaf_deletions: Vec<NodeRef>,
    pub container_deletions: Vec<NodeRef>,
    pub fts_targets: Vec<(NodeRef, String)>,
    pub updated_at: DateTime<Utc>,
}

impl DeltaStatusRecord {
    pub fn new(delta_id: impl Into<String>, status: DeltaStatus) -> Self {
        DeltaStatusRecord {
            delta_id: delta_id.into(),
            status,
            xid: None,
            segment: None,
            document_count: 0,
            leaf_deletions: Vec::new(),
            container_deletions: Vec::new(),
            fts_targets: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    /// Writes `[crc32 u32][bincode]` to a temp file and renames it in place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = bincode::serialize(self)?;
        let checksum = crc32fast::hash(&data);

        let tmp = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&checksum.to_le_bytes())?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        if bytes.len() < 4 {
            return Err(Error::storage(format!("truncated delta status {}", path.display())));
        }
        let checksum = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if crc32fast::hash(&bytes[4..]) != checksum {
            return Err(Error::storage(format!("corrupt delta status {}", path.display())));
        }
        Ok(bincode::deserialize(&bytes[4..])?)
    }
}
