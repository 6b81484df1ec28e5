use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use crc32fast::Hasher;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::document::Document;
use crate::storage::segment::{SegmentHeader, SegmentId};

pub struct SegmentReader {
    pub segment_id: SegmentId,
    pub header: SegmentHeader,
    file: BufReader<File>,
}

impl SegmentReader {
    pub fn open(path: &Path, segment_id: SegmentId) -> Result<Self> {
        let mut file = BufReader::new(File::open(path)?);

        let mut header_buf = [0u8; SegmentHeader::SIZE];
        file.read_exact(&mut header_buf)?;
        let header: SegmentHeader = bincode::deserialize(&header_buf)?;

        if header.version != SegmentHeader::VERSION {
            return Err(Error::storage(format!(
                "incompatible segment version {} in {}",
                header.version,
                path.display()
            )));
        }

        Ok(SegmentReader { segment_id, header, file })
    }

    /// Reads every document and verifies the checksum.
    pub fn read_all(mut self) -> Result<Vec<Document>> {
        let mut docs = Vec::with_capacity(self.header.doc_count as usize);
        let mut hasher = Hasher::new();

        for _ in 0..self.header.doc_count {
            let mut len_buf = [0u8; 4];
            self.file.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut data = vec![0u8; len];
            self.file.read_exact(&mut data)?;
            hasher.update(&len_buf);
            hasher.update(&data);

            let raw = lz4_flex::decompress_size_prepended(&data)
                .map_err(|e| Error::with_source(ErrorKind::Storage, "corrupt segment block", e))?;
            docs.push(bincode::deserialize(&raw)?);
        }

        if hasher.finalize() != self.header.checksum {
            return Err(Error::storage(format!("checksum mismatch in segment {}", self.segment_id.0)));
        }
        Ok(docs)
    }
}
