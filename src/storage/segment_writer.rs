use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use chrono::Utc;
use crc32fast::Hasher;
use crate::core::error::Result;
use crate::index::document::Document;
use crate::storage::segment::{Segment, SegmentHeader, SegmentId, SegmentMetadata};

/// Streams documents into a segment file.
///
/// Layout:
/// ```text
/// [ HEADER (zero padded to SegmentHeader::SIZE) ]
/// [ len u32 | lz4(bincode(Document)) ]
/// [ len u32 | lz4(bincode(Document)) ]
/// ```
pub struct SegmentWriter {
    pub segment: Segment,
    path: PathBuf,
    file: BufWriter<File>,
    hasher: Hasher,
}

impl SegmentWriter {
    pub fn create(path: &Path, segment_id: SegmentId) -> Result<Self> {
        let mut file = BufWriter::new(File::create(path)?);
        // Placeholder, rewritten in finish()
        file.write_all(&[0u8; SegmentHeader::SIZE])?;

        Ok(SegmentWriter {
            segment: Segment {
                id: segment_id,
                doc_count: 0,
                metadata: SegmentMetadata {
                    created_at: Utc::now(),
                    size_bytes: 0,
                },
            },
            path: path.to_path_buf(),
            file,
            hasher: Hasher::new(),
        })
    }

    pub fn write_document(&mut self, doc: &Document) -> Result<()> {
        let data = bincode::serialize(doc)?;
        let compressed = lz4_flex::compress_prepend_size(&data);

        let len = (compressed.len() as u32).to_le_bytes();
        self.hasher.update(&len);
        self.hasher.update(&compressed);
        self.file.write_all(&len)?;
        self.file.write_all(&compressed)?;

        self.segment.doc_count += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<Segment> {
        let SegmentWriter { mut segment, path, file, hasher } = self;
        let mut file = file.into_inner().map_err(|e| e.into_error())?;

        let mut header = SegmentHeader::new(segment.doc_count);
        header.checksum = hasher.finalize();
        let mut header_data = bincode::serialize(&header)?;
        header_data.resize(SegmentHeader::SIZE, 0);

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&header_data)?;
        file.sync_all()?;

        segment.metadata.size_bytes = file.metadata()?.len();
        tracing::debug!(path = %path.display(), docs = segment.doc_count, "segment written");
        Ok(segment)
    }
}

/// Writes all documents to a new segment file in one go.
pub fn write_segment<'a, I>(path: &Path, segment_id: SegmentId, docs: I) -> Result<Segment>
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut writer = SegmentWriter::create(path, segment_id)?;
    for doc in docs {
        writer.write_document(doc)?;
    }
    writer.finish()
}
