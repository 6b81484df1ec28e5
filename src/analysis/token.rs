use serde::{Deserialize, Serialize};

/// One analyzed term of a field value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub position: u32,  // Ordinal within the value
    pub offset: usize,  // Byte offset in the value, locale marker excluded
}

impl Token {
    pub fn new(text: impl Into<String>, position: u32, offset: usize) -> Self {
        Token {
            text: text.into(),
            position,
            offset,
        }
    }

    /// Same position, different term text.
    pub fn rewritten(self, text: String) -> Self {
        Token { text, ..self }
    }
}
