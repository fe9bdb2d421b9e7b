use std::ops::Range;

use skeleton::Document;
use skeleton::document::{Block, Paragraph, Row};
use skeleton::template::scanner::may_contain_placeholder;
use skeleton::template::{Token, detect, scan};

use crate::diagnostics::{Diagnostic, DiagnosticKind, Location, Part, Step};
use crate::expand::Expand;
use crate::substitute::{
    Reference, classify, directive_message, invalid_path_message, split_message,
    split_placeholders,
};

/// Check a skeleton's structure without any data.
///
/// Reports marker problems, directives that share a paragraph, malformed
/// placeholders and placeholders split across runs. Binding problems
/// (unresolved names, type mismatches) need data and are left to `render`.
pub fn validate(skeleton: &Document) -> Vec<Diagnostic> {
    let mut validator = Validator::default();
    validator.check_items(&skeleton.body, &Location::new(Part::Body));
    for (n, header) in skeleton.headers.iter().enumerate() {
        validator.check_items(header, &Location::new(Part::Header(n)));
    }
    for (n, footer) in skeleton.footers.iter().enumerate() {
        validator.check_items(footer, &Location::new(Part::Footer(n)));
    }
    tracing::debug!(diagnostics = validator.diagnostics.len(), "validated skeleton");
    validator.diagnostics
}

trait Inspect: Expand {
    fn inspect(&self, validator: &mut Validator, location: &Location);
}

impl Inspect for Block {
    fn inspect(&self, validator: &mut Validator, location: &Location) {
        match self {
            Block::Paragraph(p) => validator.check_paragraph(p, location),
            Block::Table(t) => validator.check_items(&t.rows, location),
        }
    }
}

impl Inspect for Row {
    fn inspect(&self, validator: &mut Validator, location: &Location) {
        for (c, cell) in self.cells.iter().enumerate() {
            validator.check_items(&cell.blocks, &location.child(Step::Cell(c)));
        }
    }
}

#[derive(Default)]
struct Validator {
    diagnostics: Vec<Diagnostic>,
}

impl Validator {
    fn push(&mut self, kind: DiagnosticKind, location: &Location, span: Range<usize>, message: String) {
        self.diagnostics.push(Diagnostic {
            kind,
            location: location.clone(),
            span,
            message,
        });
    }

    fn check_items<T: Inspect>(&mut self, items: &[T], location: &Location) {
        let regions = detect(items);
        let mut errors = regions.errors.iter().peekable();

        for (index, item) in items.iter().enumerate() {
            let item_location = location.child(T::step(index));
            while let Some(error) = errors.next_if(|e| e.index == index) {
                self.push(
                    DiagnosticKind::MalformedLoop,
                    &item_location,
                    item.source_span(),
                    error.message.clone(),
                );
            }
            // Whole-item directives are consumed by expansion.
            if item.marker().is_some() {
                continue;
            }
            item.inspect(self, &item_location);
        }
    }

    fn check_paragraph(&mut self, paragraph: &Paragraph, location: &Location) {
        let span = paragraph.span.clone();
        for raw in split_placeholders(paragraph) {
            self.push(
                DiagnosticKind::SplitPlaceholder,
                location,
                span.clone(),
                split_message(&raw),
            );
        }

        for run in &paragraph.runs {
            if !may_contain_placeholder(run.text()) {
                continue;
            }
            for token in scan(run.text()) {
                let Token::Placeholder(placeholder) = token else {
                    continue;
                };
                match classify(&placeholder) {
                    Reference::Path(_) => {}
                    Reference::Directive => self.push(
                        DiagnosticKind::MalformedLoop,
                        location,
                        span.clone(),
                        directive_message(placeholder.raw),
                    ),
                    Reference::Invalid => self.push(
                        DiagnosticKind::Unresolved,
                        location,
                        span.clone(),
                        invalid_path_message(placeholder.raw),
                    ),
                }
            }
        }
    }
}
