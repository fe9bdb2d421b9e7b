use std::ops::Range;

use pulldown_cmark::{Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::document::{
    Block, Cell, ColumnAlignment, Document, Paragraph, ParagraphStyle, Row, Run, RunStyle, Table,
};
use crate::parser::error::ParseError;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse a Markdown skeleton into a Document.
pub fn parse_document(source: &str, file_id: usize) -> Result<Document, Vec<ParseError>> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let parser = CmarkParser::new_ext(source, options);
    let events: Vec<(Event<'_>, Range<usize>)> = parser.into_offset_iter().collect();

    let mut state = ParseState::new(file_id);
    state.process_events(&events);
    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

/// Which story subsequent blocks are appended to.
#[derive(Debug, Clone, Copy)]
enum Story {
    Body,
    Header(usize),
    Footer(usize),
}

struct ParseState {
    file_id: usize,
    document: Document,
    story: Story,
    /// Paragraph style of each open list, innermost last.
    lists: Vec<ParagraphStyle>,
    quote_depth: usize,
    errors: Vec<ParseError>,
}

/// Nesting depth of each inline formatting tag.
#[derive(Debug, Default)]
struct InlineDepth {
    bold: u32,
    italic: u32,
    strikethrough: u32,
}

impl InlineDepth {
    fn style(&self) -> RunStyle {
        RunStyle {
            bold: self.bold > 0,
            italic: self.italic > 0,
            strikethrough: self.strikethrough > 0,
            code: false,
        }
    }
}

impl ParseState {
    fn new(file_id: usize) -> Self {
        ParseState {
            file_id,
            document: Document::default(),
            story: Story::Body,
            lists: Vec::new(),
            quote_depth: 0,
            errors: Vec::new(),
        }
    }

    fn blocks_mut(&mut self) -> &mut Vec<Block> {
        match self.story {
            Story::Body => &mut self.document.body,
            Story::Header(n) => &mut self.document.headers[n],
            Story::Footer(n) => &mut self.document.footers[n],
        }
    }

    fn paragraph_style(&self) -> ParagraphStyle {
        if let Some(style) = self.lists.last() {
            *style
        } else if self.quote_depth > 0 {
            ParagraphStyle::Quote
        } else {
            ParagraphStyle::Normal
        }
    }

    fn push_paragraph(&mut self, style: ParagraphStyle, runs: Vec<Run>, span: Range<usize>) {
        self.blocks_mut()
            .push(Block::Paragraph(Paragraph { style, runs, span }));
    }

    fn process_events(&mut self, events: &[(Event<'_>, Range<usize>)]) {
        let mut i = 0;

        while i < events.len() {
            let (ref ev, ref range) = events[i];

            match ev {
                Event::Start(Tag::Paragraph) => {
                    i += 1;
                    let runs = collect_runs(events, &mut i, &|e| {
                        matches!(e, Event::End(TagEnd::Paragraph))
                    });
                    i += 1;
                    let style = self.paragraph_style();
                    self.push_paragraph(style, runs, range.clone());
                }

                Event::Start(Tag::Heading { level, .. }) => {
                    let style = ParagraphStyle::Heading(heading_level_to_u8(level));
                    i += 1;
                    let runs = collect_runs(events, &mut i, &|e| {
                        matches!(e, Event::End(TagEnd::Heading(_)))
                    });
                    i += 1;
                    self.push_paragraph(style, runs, range.clone());
                }

                Event::Start(Tag::List(first)) => {
                    self.lists.push(if first.is_some() {
                        ParagraphStyle::ListNumber
                    } else {
                        ParagraphStyle::ListBullet
                    });
                    i += 1;
                }
                Event::End(TagEnd::List(_)) => {
                    self.lists.pop();
                    i += 1;
                }

                // Tight list items carry inline content without a paragraph tag.
                Event::Start(Tag::Item) => {
                    i += 1;
                    if events.get(i).is_some_and(|(e, _)| is_inline_event(e)) {
                        let runs = collect_runs(events, &mut i, &|e| {
                            matches!(e, Event::End(TagEnd::Item))
                                || matches!(e, Event::Start(tag) if !is_inline_tag(tag))
                        });
                        let style = self.paragraph_style();
                        self.push_paragraph(style, runs, range.clone());
                    }
                }

                Event::Start(Tag::BlockQuote(_)) => {
                    self.quote_depth += 1;
                    i += 1;
                }
                Event::End(TagEnd::BlockQuote(_)) => {
                    self.quote_depth = self.quote_depth.saturating_sub(1);
                    i += 1;
                }

                Event::Start(Tag::Table(alignments)) => {
                    let alignments: Vec<ColumnAlignment> = alignments
                        .iter()
                        .map(|a| match a {
                            pulldown_cmark::Alignment::None => ColumnAlignment::None,
                            pulldown_cmark::Alignment::Left => ColumnAlignment::Left,
                            pulldown_cmark::Alignment::Center => ColumnAlignment::Center,
                            pulldown_cmark::Alignment::Right => ColumnAlignment::Right,
                        })
                        .collect();
                    i += 1;
                    let rows = collect_rows(events, &mut i);
                    let table = Table {
                        style: None,
                        alignments,
                        rows,
                        span: range.clone(),
                    };
                    self.blocks_mut().push(Block::Table(table));
                }

                Event::Start(Tag::HtmlBlock) => {
                    i += 1;
                    let mut html = String::new();
                    while i < events.len() {
                        match &events[i].0 {
                            Event::End(TagEnd::HtmlBlock) => {
                                i += 1;
                                break;
                            }
                            Event::Html(s) | Event::Text(s) => html.push_str(s),
                            _ => {}
                        }
                        i += 1;
                    }
                    self.process_html(&html, range.clone());
                }

                Event::Start(Tag::CodeBlock(_)) => {
                    self.errors.push(
                        ParseError::error(
                            "code blocks are not supported in skeletons",
                            range.clone(),
                            self.file_id,
                        )
                        .with_note("write the content as ordinary paragraphs, using `code` spans for monospace text"),
                    );
                    i += 1;
                    while i < events.len() {
                        let done = matches!(events[i].0, Event::End(TagEnd::CodeBlock));
                        i += 1;
                        if done {
                            break;
                        }
                    }
                }

                Event::Rule => {
                    self.errors.push(ParseError::error(
                        "thematic breaks are not supported in skeletons",
                        range.clone(),
                        self.file_id,
                    ));
                    i += 1;
                }

                _ => {
                    i += 1;
                }
            }
        }
    }

    /// Story switches are HTML comments; other comments are ignored.
    fn process_html(&mut self, html: &str, span: Range<usize>) {
        let trimmed = html.trim();
        let Some(comment) = trimmed
            .strip_prefix("<!--")
            .and_then(|s| s.strip_suffix("-->"))
        else {
            self.errors.push(
                ParseError::error(
                    "raw HTML is not supported in skeletons",
                    span,
                    self.file_id,
                )
                .with_note("only `<!-- header -->`, `<!-- footer -->` and `<!-- body -->` comments are recognized"),
            );
            return;
        };

        match comment.trim().to_ascii_lowercase().as_str() {
            "header" => {
                self.document.headers.push(Vec::new());
                self.story = Story::Header(self.document.headers.len() - 1);
            }
            "footer" => {
                self.document.footers.push(Vec::new());
                self.story = Story::Footer(self.document.footers.len() - 1);
            }
            "body" => self.story = Story::Body,
            _ => {}
        }
    }

    fn finalize(self) -> Result<Document, Vec<ParseError>> {
        if self.errors.is_empty() {
            tracing::debug!(
                body = self.document.body.len(),
                headers = self.document.headers.len(),
                footers = self.document.footers.len(),
                "parsed skeleton"
            );
            Ok(self.document)
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Collect styled runs until `stop` matches. The stopping event is not consumed.
/// Adjacent text with the same style is coalesced into a single run.
fn collect_runs(
    events: &[(Event<'_>, Range<usize>)],
    i: &mut usize,
    stop: &dyn Fn(&Event<'_>) -> bool,
) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    let mut depth = InlineDepth::default();

    while *i < events.len() {
        let (ref ev, _) = events[*i];
        if stop(ev) {
            break;
        }
        match ev {
            Event::InlineHtml(s) if is_line_break(s) => push_text(&mut runs, "\n", depth.style()),
            Event::Text(s) | Event::InlineHtml(s) => push_text(&mut runs, s, depth.style()),
            Event::Code(s) => {
                let style = RunStyle {
                    code: true,
                    ..depth.style()
                };
                push_text(&mut runs, s, style);
            }
            Event::SoftBreak | Event::HardBreak => push_text(&mut runs, "\n", depth.style()),
            Event::Start(Tag::Strong) => depth.bold += 1,
            Event::End(TagEnd::Strong) => depth.bold = depth.bold.saturating_sub(1),
            Event::Start(Tag::Emphasis) => depth.italic += 1,
            Event::End(TagEnd::Emphasis) => depth.italic = depth.italic.saturating_sub(1),
            Event::Start(Tag::Strikethrough) => depth.strikethrough += 1,
            Event::End(TagEnd::Strikethrough) => {
                depth.strikethrough = depth.strikethrough.saturating_sub(1)
            }
            _ => {}
        }
        *i += 1;
    }

    runs
}

fn push_text(runs: &mut Vec<Run>, text: &str, style: RunStyle) {
    match runs.last_mut() {
        Some(last) if last.style == style => last.push_str(text),
        _ => runs.push(Run::new(text, style)),
    }
}

/// `<br>` in any of its spellings. Table cells use it for line breaks.
fn is_line_break(html: &str) -> bool {
    let tag = html.trim().to_ascii_lowercase();
    matches!(tag.as_str(), "<br>" | "<br/>" | "<br />")
}

/// Collect table rows until End(Table), which is consumed.
fn collect_rows(events: &[(Event<'_>, Range<usize>)], i: &mut usize) -> Vec<Row> {
    let mut rows = Vec::new();
    let mut current: Vec<Cell> = Vec::new();

    while *i < events.len() {
        let (ref ev, ref range) = events[*i];
        match ev {
            Event::End(TagEnd::Table) => {
                *i += 1;
                break;
            }
            Event::Start(Tag::TableHead) | Event::Start(Tag::TableRow) => {
                current = Vec::new();
                *i += 1;
            }
            Event::End(TagEnd::TableHead) => {
                rows.push(Row {
                    header: true,
                    cells: std::mem::take(&mut current),
                });
                *i += 1;
            }
            Event::End(TagEnd::TableRow) => {
                rows.push(Row {
                    header: false,
                    cells: std::mem::take(&mut current),
                });
                *i += 1;
            }
            Event::Start(Tag::TableCell) => {
                *i += 1;
                let runs = collect_runs(events, i, &|e| matches!(e, Event::End(TagEnd::TableCell)));
                *i += 1;
                let paragraph = Paragraph {
                    style: ParagraphStyle::Normal,
                    runs,
                    span: range.clone(),
                };
                current.push(Cell {
                    blocks: vec![Block::Paragraph(paragraph)],
                });
            }
            _ => {
                *i += 1;
            }
        }
    }

    rows
}

fn is_inline_tag(tag: &Tag<'_>) -> bool {
    matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
    )
}

fn is_inline_event(ev: &Event<'_>) -> bool {
    match ev {
        Event::Text(_)
        | Event::Code(_)
        | Event::InlineHtml(_)
        | Event::SoftBreak
        | Event::HardBreak => true,
        Event::Start(tag) => is_inline_tag(tag),
        _ => false,
    }
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
