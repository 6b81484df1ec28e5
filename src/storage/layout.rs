use std::fs;
use std::path::{Path, PathBuf};
use crate::core::error::Result;
use crate::core::types::StoreRef;
use crate::storage::segment::SegmentId;

/// Directory structure for one store's index files
///
/// ```text
/// <root>/<protocol>/<identifier>/
///     .lock
///     segments/<uuid>.seg      committed main index segments
///     journal/commits.log      commit journal
///     deltas/<delta-id>/       one directory per live delta
///         status.bin
///         delta.seg
/// ```
#[derive(Debug, Clone)]
pub struct StoreLayout {
    pub base_dir: PathBuf,
    pub segments_dir: PathBuf,
    pub journal_dir: PathBuf,
    pub deltas_dir: PathBuf,
}

impl StoreLayout {
    pub fn new(root: &Path, store: &StoreRef) -> Result<Self> {
        let base_dir = root.join(sanitize(&store.protocol)).join(sanitize(&store.identifier));
        let segments_dir = base_dir.join("segments");
        let journal_dir = base_dir.join("journal");
        let deltas_dir = base_dir.join("deltas");

        fs::create_dir_all(&segments_dir)?;
        fs::create_dir_all(&journal_dir)?;
        fs::create_dir_all(&deltas_dir)?;

        Ok(StoreLayout {
            base_dir,
            segments_dir,
            journal_dir,
            deltas_dir,
        })
    }

    /// Stores that already have a directory under `root`.
    pub fn discover(root: &Path) -> Result<Vec<StoreRef>> {
        let mut stores = Vec::new();
        if !root.exists() {
            return Ok(stores);
        }
        for protocol in fs::read_dir(root)? {
            let protocol = protocol?;
            if !protocol.file_type()?.is_dir() {
                continue;
            }
            for identifier in fs::read_dir(protocol.path())? {
                let identifier = identifier?;
                if !identifier.path().join("journal").is_dir() {
                    continue;
                }
                stores.push(StoreRef::new(
                    protocol.file_name().to_string_lossy(),
                    identifier.file_name().to_string_lossy(),
                ));
            }
        }
        stores.sort();
        Ok(stores)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    pub fn segment_path(&self, id: &SegmentId) -> PathBuf {
        self.segments_dir.join(format!("{}.seg", id.0))
    }

    pub fn journal_path(&self) -> PathBuf {
        self.journal_dir.join("commits.log")
    }

    pub fn delta_dir(&self, delta_id: &str) -> PathBuf {
        self.deltas_dir.join(delta_id)
    }

    pub fn delta_status_path(&self, delta_id: &str) -> PathBuf {
        self.delta_dir(delta_id).join("status.bin")
    }

    pub fn delta_segment_path(&self, delta_id: &str) -> PathBuf {
        self.delta_dir(delta_id).join("delta.seg")
    }

    /// Ids of every delta directory currently on disk.
    pub fn delta_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.deltas_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discover_finds_created_stores() {
        let dir = tempfile::tempdir().unwrap();
        let store = StoreRef::new("workspace", "SpacesStore");
        let layout = StoreLayout::new(dir.path(), &store).unwrap();
        fs::create_dir_all(layout.delta_dir("d1")).unwrap();

        assert_eq!(StoreLayout::discover(dir.path()).unwrap(), vec![store]);
        assert_eq!(layout.delta_ids().unwrap(), vec!["d1".to_string()]);
    }
}
