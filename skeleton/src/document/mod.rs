pub mod normalize;

use std::fmt;
use std::ops::Range;

/// A structured document: a body plus any number of header and footer stories.
/// Every story is an ordered sequence of blocks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub body: Vec<Block>,
    pub headers: Vec<Vec<Block>>,
    pub footers: Vec<Vec<Block>>,
}

impl Document {
    pub fn new(body: Vec<Block>) -> Self {
        Document {
            body,
            headers: Vec::new(),
            footers: Vec::new(),
        }
    }
}

/// A structural unit in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

impl Block {
    /// Byte span of the block in the skeleton source (`0..0` when built in code).
    pub fn span(&self) -> Range<usize> {
        match self {
            Block::Paragraph(p) => p.span.clone(),
            Block::Table(t) => t.span.clone(),
        }
    }

    /// Plain text of the block, with formatting dropped.
    pub fn text(&self) -> String {
        match self {
            Block::Paragraph(p) => p.text(),
            Block::Table(t) => t
                .rows
                .iter()
                .map(Row::text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParagraphStyle {
    #[default]
    Normal,
    Heading(u8),
    ListBullet,
    ListNumber,
    Quote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub style: ParagraphStyle,
    pub runs: Vec<Run>,
    pub span: Range<usize>,
}

impl Paragraph {
    pub fn new(style: ParagraphStyle, runs: Vec<Run>) -> Self {
        Paragraph {
            style,
            runs,
            span: 0..0,
        }
    }

    /// A normal paragraph holding one unstyled run.
    pub fn plain(text: impl Into<String>) -> Self {
        Paragraph::new(ParagraphStyle::Normal, vec![Run::plain(text)])
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text()).collect()
    }
}

/// Minimal styled text fragment. The atomic unit of substitution.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    text: String,
    pub style: RunStyle,
}

impl Run {
    pub fn new(text: impl Into<String>, style: RunStyle) -> Self {
        Run {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Run::new(text, RunStyle::default())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the run's text. The style is left untouched.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub(crate) fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunStyle {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
}

impl RunStyle {
    pub fn bold() -> Self {
        RunStyle {
            bold: true,
            ..RunStyle::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Named table style, e.g. `"Table Grid"`.
    pub style: Option<String>,
    pub alignments: Vec<ColumnAlignment>,
    pub rows: Vec<Row>,
    pub span: Range<usize>,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.cells.len())
            .max()
            .unwrap_or(0)
            .max(self.alignments.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub header: bool,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn text(&self) -> String {
        self.cells
            .iter()
            .map(Cell::text)
            .collect::<Vec<_>>()
            .join("\t")
    }
}

/// A table cell. Cells are block containers in their own right.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub blocks: Vec<Block>,
}

impl Cell {
    pub fn from_runs(runs: Vec<Run>) -> Self {
        Cell {
            blocks: vec![Block::Paragraph(Paragraph::new(ParagraphStyle::Normal, runs))],
        }
    }

    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnAlignment {
    None,
    Left,
    Center,
    Right,
}

// ---------------------------------------------------------------------------
// Markdown writer
// ---------------------------------------------------------------------------

fn write_blocks(f: &mut fmt::Formatter<'_>, blocks: &[Block]) -> fmt::Result {
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            writeln!(f)?;
        }
        write!(f, "{}", block)?;
    }
    Ok(())
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let has_stories = !self.headers.is_empty() || !self.footers.is_empty();
        for header in &self.headers {
            writeln!(f, "<!-- header -->")?;
            writeln!(f)?;
            write_blocks(f, header)?;
            writeln!(f)?;
        }
        if has_stories {
            writeln!(f, "<!-- body -->")?;
            writeln!(f)?;
        }
        write_blocks(f, &self.body)?;
        for footer in &self.footers {
            writeln!(f)?;
            writeln!(f, "<!-- footer -->")?;
            writeln!(f)?;
            write_blocks(f, footer)?;
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Paragraph(p) => write!(f, "{}", p),
            Block::Table(t) => write!(f, "{}", t),
        }
    }
}

impl fmt::Display for Paragraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.style {
            ParagraphStyle::Normal => {}
            ParagraphStyle::Heading(level) => {
                for _ in 0..level {
                    write!(f, "#")?;
                }
                write!(f, " ")?;
            }
            ParagraphStyle::ListBullet => write!(f, "- ")?,
            ParagraphStyle::ListNumber => write!(f, "1. ")?,
            ParagraphStyle::Quote => write!(f, "> ")?,
        }
        for run in &self.runs {
            write!(f, "{}", run)?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Run {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_run(f, self, false)
    }
}

/// Write a run wrapped in its style markers. Text is escaped so that data
/// never reads back as markup. Inside a table cell a line break is `<br>`.
fn write_run(f: &mut fmt::Formatter<'_>, run: &Run, in_cell: bool) -> fmt::Result {
    let text = run.text.as_str();
    let core = text.trim();
    if core.is_empty() {
        return write_whitespace(f, text, in_cell);
    }
    let lead = &text[..text.len() - text.trim_start().len()];
    let trail = &text[text.trim_end().len()..];

    let mut markers: Vec<&str> = Vec::new();
    if run.style.strikethrough {
        markers.push("~~");
    }
    if run.style.bold {
        markers.push("**");
    }
    if run.style.italic {
        markers.push("*");
    }

    write_whitespace(f, lead, in_cell)?;
    for m in &markers {
        write!(f, "{}", m)?;
    }
    if run.style.code {
        write_code(f, core, in_cell)?;
    } else {
        f.write_str(&escape_text(core, in_cell))?;
    }
    for m in markers.iter().rev() {
        write!(f, "{}", m)?;
    }
    write_whitespace(f, trail, in_cell)
}

fn write_whitespace(f: &mut fmt::Formatter<'_>, text: &str, in_cell: bool) -> fmt::Result {
    if in_cell && text.contains('\n') {
        f.write_str(&text.replace('\n', "<br>"))
    } else {
        f.write_str(text)
    }
}

/// A code span fenced by one more backtick than the longest run inside it.
fn write_code(f: &mut fmt::Formatter<'_>, code: &str, in_cell: bool) -> fmt::Result {
    let longest = code.split(|c| c != '`').map(str::len).max().unwrap_or(0);
    let fence = "`".repeat(longest + 1);
    let pad = if code.starts_with('`') || code.ends_with('`') { " " } else { "" };
    let code = if in_cell {
        code.replace('|', "\\|").replace('\n', " ")
    } else {
        code.to_string()
    };
    write!(f, "{fence}{pad}{code}{pad}{fence}")
}

/// Backslash-escape everything in `text` that CommonMark could read as
/// inline or block syntax.
fn escape_text(text: &str, in_cell: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut line_start = true;
    let mut leading_digits = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\n' if in_cell => {
                out.push_str("<br>");
                line_start = true;
                leading_digits = false;
                continue;
            }
            '\n' => {
                out.push('\n');
                line_start = true;
                leading_digits = false;
                continue;
            }
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '#' | '~' | '|' | '&' => out.push('\\'),
            '-' | '+' | '=' if line_start => out.push('\\'),
            '.' | ')' if leading_digits && chars.peek().is_none_or(|c| c.is_whitespace()) => {
                out.push('\\')
            }
            _ => {}
        }
        leading_digits = ch.is_ascii_digit() && (line_start || leading_digits);
        line_start = line_start && ch == ' ';
        out.push(ch);
    }
    out
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let columns = self.column_count();
        for (i, row) in self.rows.iter().enumerate() {
            write!(f, "{}", row)?;
            if i == 0 {
                write!(f, "|")?;
                for c in 0..columns {
                    let sep = match self.alignments.get(c) {
                        Some(ColumnAlignment::Left) => ":---",
                        Some(ColumnAlignment::Center) => ":---:",
                        Some(ColumnAlignment::Right) => "---:",
                        _ => "---",
                    };
                    write!(f, "{}|", sep)?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|")?;
        for cell in &self.cells {
            write!(f, " {} |", cell)?;
        }
        writeln!(f)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match block {
                Block::Paragraph(p) => {
                    for run in &p.runs {
                        write_run(f, run, true)?;
                    }
                }
                Block::Table(t) => {
                    let text = t.rows.iter().map(Row::text).collect::<Vec<_>>().join(" ");
                    f.write_str(&escape_text(&text, true))?;
                }
            }
        }
        Ok(())
    }
}
