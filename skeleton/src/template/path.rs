use std::fmt;

/// A parsed placeholder reference: `name`, `order.customer.name`, `items[0].price`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A mapping key.
    Field(String),
    /// A sequence position, written `[n]`.
    Index(usize),
}

impl Path {
    /// Parse `ident ( '.' ident | '[' digits ']' )*` where
    /// `ident = [A-Za-z_][A-Za-z0-9_]*`. Returns `None` for anything else.
    pub fn parse(text: &str) -> Option<Path> {
        let bytes = text.as_bytes();
        let mut segments = Vec::new();
        let mut i = 0;

        let (ident, next) = read_ident(text, i)?;
        segments.push(PathSegment::Field(ident.to_string()));
        i = next;

        while i < bytes.len() {
            match bytes[i] {
                b'.' => {
                    let (ident, next) = read_ident(text, i + 1)?;
                    segments.push(PathSegment::Field(ident.to_string()));
                    i = next;
                }
                b'[' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && bytes[end].is_ascii_digit() {
                        end += 1;
                    }
                    if end == start || bytes.get(end) != Some(&b']') {
                        return None;
                    }
                    let index = text[start..end].parse::<usize>().ok()?;
                    segments.push(PathSegment::Index(index));
                    i = end + 1;
                }
                _ => return None,
            }
        }

        Some(Path { segments })
    }

    /// The leading field name, looked up through the binding context.
    pub fn head(&self) -> &str {
        match self.segments.first() {
            Some(PathSegment::Field(name)) => name,
            _ => "",
        }
    }

    pub fn tail(&self) -> &[PathSegment] {
        self.segments.get(1..).unwrap_or(&[])
    }
}

fn read_ident(text: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = text.as_bytes();
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut end = start + 1;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    Some((&text[start..end], end))
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}
