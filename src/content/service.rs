use std::sync::Arc;
use crate::core::error::Result;
use crate::core::types::{NodeRef, QName};

pub const MIMETYPE_TEXT_PLAIN: &str = "text/plain";
pub const ENCODING_UTF8: &str = "UTF-8";

/// Raw bytes of a content property
#[derive(Debug, Clone, PartialEq)]
pub struct ContentReader {
    pub mimetype: String,
    pub encoding: String,
    pub bytes: Vec<u8>,
}

impl ContentReader {
    pub fn new(mimetype: impl Into<String>, encoding: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        ContentReader {
            mimetype: mimetype.into(),
            encoding: encoding.into(),
            bytes: bytes.into(),
        }
    }

    pub fn plain_text(text: &str) -> Self {
        Self::new(MIMETYPE_TEXT_PLAIN, ENCODING_UTF8, text.as_bytes())
    }

    /// Already in the form analyzers expect.
    pub fn is_plain_utf8(&self) -> bool {
        self.mimetype == MIMETYPE_TEXT_PLAIN && self.encoding.eq_ignore_ascii_case(ENCODING_UTF8)
    }

    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Converts content of one mimetype to plain text.
pub trait ContentTransformer: Send + Sync {
    /// Expected transformation time; compared against the atomic cost ceiling.
    fn cost(&self) -> u64;

    fn transform(&self, reader: &ContentReader) -> Result<String>;
}

pub trait ContentService: Send + Sync {
    /// `Ok(None)` when the node has no bytes for the property.
    fn reader(&self, node: &NodeRef, property: &QName) -> Result<Option<ContentReader>>;

    fn transformer(&self, source_mimetype: &str, target_mimetype: &str) -> Option<Arc<dyn ContentTransformer>>;
}
