use crate::document::{Block, Row};
use crate::template::path::Path;
use crate::template::scanner::{Token, scan};

pub const LOOP_PREFIX: &str = "LOOP:";
pub const TABLE_PREFIX: &str = "TABLE:";
pub const END_LOOP: &str = "ENDLOOP";

/// A structural directive occupying a whole block (or a whole table row).
#[derive(Debug, Clone, PartialEq)]
pub enum Marker {
    /// `{{LOOP:path}}`: opens a loop region.
    Open(Path),
    /// `{{ENDLOOP}}`: closes the innermost open loop region.
    Close,
    /// `{{TABLE:path}}`: replaced by a table generated from a sequence of mappings.
    Table(Path),
}

impl Marker {
    /// Classify the full text content of a block.
    ///
    /// `None` means the text is not marker-shaped at all. `Some(Err(..))` means it
    /// is a directive with an unusable name.
    pub fn parse(text: &str) -> Option<Result<Marker, String>> {
        let trimmed = text.trim();
        let mut tokens = scan(trimmed);
        let (Some(Token::Placeholder(placeholder)), None) = (tokens.next(), tokens.next()) else {
            return None;
        };
        Marker::from_reference(placeholder.inner())
    }

    /// Classify the text between `{{` and `}}`.
    pub fn from_reference(inner: &str) -> Option<Result<Marker, String>> {
        if inner == END_LOOP {
            return Some(Ok(Marker::Close));
        }
        if let Some(name) = inner.strip_prefix(LOOP_PREFIX) {
            return Some(
                Path::parse(name.trim())
                    .map(Marker::Open)
                    .ok_or_else(|| format!("invalid loop name `{}`", name.trim())),
            );
        }
        if let Some(name) = inner.strip_prefix(TABLE_PREFIX) {
            return Some(
                Path::parse(name.trim())
                    .map(Marker::Table)
                    .ok_or_else(|| format!("invalid table name `{}`", name.trim())),
            );
        }
        None
    }
}

/// Items that can stand as markers inside a container: blocks in a story or
/// cell, rows in a table.
pub trait Markable {
    /// The text to classify, or `None` if this item can never be a marker.
    fn marker_text(&self) -> Option<String>;

    fn marker(&self) -> Option<Result<Marker, String>> {
        self.marker_text().and_then(|text| Marker::parse(&text))
    }
}

impl Markable for Block {
    fn marker_text(&self) -> Option<String> {
        match self {
            Block::Paragraph(p) => Some(p.text()),
            Block::Table(_) => None,
        }
    }
}

impl Markable for Row {
    /// A marker row has exactly one non-empty cell.
    fn marker_text(&self) -> Option<String> {
        let mut filled = self
            .cells
            .iter()
            .map(|c| c.text())
            .filter(|t| !t.trim().is_empty());
        match (filled.next(), filled.next()) {
            (Some(text), None) => Some(text),
            _ => None,
        }
    }
}
