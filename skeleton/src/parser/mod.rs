pub mod error;
mod structural;

pub use error::ParseError;

use crate::document::Document;

/// Skeleton loader entry point: reads a Markdown skeleton into a [`Document`].
pub struct Parser {
    source: String,
    file_id: usize,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser { source, file_id }
    }

    /// Parse the Markdown source into a complete Document.
    pub fn parse(&self) -> Result<Document, Vec<ParseError>> {
        structural::parse_document(&self.source, self.file_id)
    }
}
