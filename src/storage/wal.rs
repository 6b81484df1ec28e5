use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::core::types::NodeRef;
use crate::storage::segment::SegmentId;

/// Append-only record of committed deltas.
///
/// A delta counts as committed once its record is in the journal; the main
/// index is rebuilt at open time by replaying the records in order.
pub struct CommitJournal {
    pub file: File,
    pub position: u64,
    pub sync_mode: SyncMode,
    pub sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Immediate,  // fsync after every record
    Batch,      // fsync every BATCH_SYNC_BYTES
    None,       // Let OS handle it
}

const BATCH_SYNC_BYTES: u64 = 1024 * 1024;
const MAX_ENTRY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub sequence: u64,
    pub record: JournalRecord,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JournalRecord {
    /// A delta merged into the main index
    Commit {
        delta_id: String,
        /// Segment holding the delta's documents, absent when it wrote none
        segment: Option<SegmentId>,
        leaf_deletions: Vec<NodeRef>,
        container_deletions: Vec<NodeRef>,
        /// Backlog work finished by this commit: (node, transaction the work was for)
        fts_targets: Vec<(NodeRef, String)>,
    },
}

impl JournalRecord {
    pub fn delta_id(&self) -> &str {
        match self {
            JournalRecord::Commit { delta_id, .. } => delta_id,
        }
    }
}

impl CommitJournal {
    /// Opens the journal and reads every complete entry.
    ///
    /// A torn record at the tail (crash during append) is cut off.
    pub fn open(path: &Path, sync_mode: SyncMode) -> Result<(Self, Vec<JournalEntry>)> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (entries, valid_len) = read_entries(&mut file)?;
        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            tracing::warn!(
                path = %path.display(),
                dropped = file_len - valid_len,
                "truncating incomplete journal tail"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        let sequence = entries.last().map(|e| e.sequence + 1).unwrap_or(0);
        Ok((
            CommitJournal {
                file,
                position: valid_len,
                sync_mode,
                sequence,
            },
            entries,
        ))
    }

    /// Reads the complete entries without opening the journal for
    /// writing. A torn tail is skipped but left on disk.
    pub fn replay(path: &Path) -> Result<Vec<JournalEntry>> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let (entries, _) = read_entries(&mut file)?;
        Ok(entries)
    }

    pub fn append(&mut self, record: JournalRecord) -> Result<u64> {
        let entry = JournalEntry {
            sequence: self.sequence,
            record,
            timestamp: Utc::now(),
        };

        let data = bincode::serialize(&entry)?;
        let len = data.len() as u32;
        let checksum = crc32fast::hash(&data);

        let mut frame = Vec::with_capacity(8 + data.len());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&checksum.to_le_bytes());
        frame.extend_from_slice(&data);
        self.file.write_all(&frame)?;

        let before = self.position;
        self.position += frame.len() as u64;
        self.sequence += 1;

        match self.sync_mode {
            SyncMode::Immediate => self.file.sync_data()?,
            SyncMode::Batch if before / BATCH_SYNC_BYTES != self.position / BATCH_SYNC_BYTES => {
                self.file.sync_data()?
            }
            _ => {}
        }

        Ok(entry.sequence)
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// Returns the complete entries and the byte length they cover.
fn read_entries(file: &mut File) -> Result<(Vec<JournalEntry>, u64)> {
    let mut entries = Vec::new();
    let mut valid_len = 0u64;
    file.seek(SeekFrom::Start(0))?;

    loop {
        let mut head = [0u8; 8];
        match file.read_exact(&mut head) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes([head[0], head[1], head[2], head[3]]) as usize;
        let checksum = u32::from_le_bytes([head[4], head[5], head[6], head[7]]);
        if len > MAX_ENTRY_BYTES {
            tracing::warn!(len, "journal entry too large, treating as torn tail");
            break;
        }

        let mut data = vec![0u8; len];
        match file.read_exact(&mut data) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        if crc32fast::hash(&data) != checksum {
            tracing::warn!(offset = valid_len, "journal checksum mismatch, treating as torn tail");
            break;
        }

        let entry: JournalEntry = bincode::deserialize(&data)
            .map_err(|e| Error::storage(format!("unreadable journal entry at {}: {}", valid_len, e)))?;
        entries.push(entry);
        valid_len += 8 + len as u64;
    }

    file.seek(SeekFrom::End(0))?;
    Ok((entries, valid_len))
}
