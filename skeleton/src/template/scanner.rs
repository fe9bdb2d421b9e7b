use std::ops::Range;

/// A token produced by scanning run text.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Literal text content, passed through untouched.
    Literal(&'a str),
    /// A `{{...}}` reference.
    Placeholder(Placeholder<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder<'a> {
    /// The full source text, braces included.
    pub raw: &'a str,
    /// Byte offset of `raw` within the scanned text.
    pub offset: usize,
}

impl<'a> Placeholder<'a> {
    /// The reference between the braces, with surrounding whitespace trimmed.
    pub fn inner(&self) -> &'a str {
        self.raw[2..self.raw.len() - 2].trim()
    }

    pub fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.raw.len()
    }
}

/// Lazy tokenizer over one run's text.
///
/// Placeholder syntax is `{{` + one or more non-`}` characters + `}}`.
/// An unterminated `{{` is literal text; scanning never fails.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

pub fn scan(text: &str) -> Scanner<'_> {
    Scanner { text, pos: 0 }
}

/// Cheap pre-check: text without `{{` scans to a single literal.
pub fn may_contain_placeholder(text: &str) -> bool {
    text.contains("{{")
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.pos >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.pos..];

        let Some(open) = rest.find("{{") else {
            self.pos = self.text.len();
            return Some(Token::Literal(rest));
        };
        if open > 0 {
            self.pos += open;
            return Some(Token::Literal(&rest[..open]));
        }

        // `rest` starts with `{{`
        let body = &rest[2..];
        let close = body.find('}');
        if let Some(len) = close.filter(|&len| len > 0 && body[len..].starts_with("}}")) {
            let raw = &rest[..2 + len + 2];
            let offset = self.pos;
            self.pos += raw.len();
            return Some(Token::Placeholder(Placeholder { raw, offset }));
        }

        // Unterminated: literal up to the next candidate opening.
        let literal_len = rest[1..].find("{{").map(|i| i + 1).unwrap_or(rest.len());
        self.pos += literal_len;
        Some(Token::Literal(&rest[..literal_len]))
    }
}
