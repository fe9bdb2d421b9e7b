use std::fmt;
use std::ops::Range;

use thiserror::Error;

use crate::options::RenderOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A placeholder with no binding; left verbatim in the output.
    Unresolved,
    /// Unmatched or ambiguous loop markers, or a directive sharing its paragraph.
    MalformedLoop,
    /// A loop bound to a non-sequence, or a sequence used as a scalar.
    TypeMismatch,
    /// A loop bound to an empty sequence. Informational.
    EmptySequence,
    /// A placeholder split across runs, which can never match.
    SplitPlaceholder,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Unresolved => "unresolved",
            DiagnosticKind::MalformedLoop => "malformed_loop",
            DiagnosticKind::TypeMismatch => "type_mismatch",
            DiagnosticKind::EmptySequence => "empty_sequence",
            DiagnosticKind::SplitPlaceholder => "split_placeholder",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The story a location starts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Body,
    Header(usize),
    Footer(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Block index within a story or cell.
    Block(usize),
    /// Row index within a table.
    Row(usize),
    /// Cell index within a row.
    Cell(usize),
}

/// Position of a template item, e.g. `body/3/r2/c1/0`. Locations always
/// name the skeleton position, also for diagnostics raised inside loop copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub part: Part,
    pub steps: Vec<Step>,
}

impl Location {
    pub fn new(part: Part) -> Self {
        Location {
            part,
            steps: Vec::new(),
        }
    }

    pub fn child(&self, step: Step) -> Location {
        let mut steps = self.steps.clone();
        steps.push(step);
        Location {
            part: self.part,
            steps,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.part {
            Part::Body => write!(f, "body")?,
            Part::Header(n) => write!(f, "header{}", n)?,
            Part::Footer(n) => write!(f, "footer{}", n)?,
        }
        for step in &self.steps {
            match step {
                Step::Block(i) => write!(f, "/{}", i)?,
                Step::Row(i) => write!(f, "/r{}", i)?,
                Step::Cell(i) => write!(f, "/c{}", i)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub location: Location,
    /// Byte span of the originating skeleton block (`0..0` if unknown).
    pub span: Range<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.location, self.message)
    }
}

/// Ordered side channel for diagnostics. Purely observational.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    options: RenderOptions,
}

impl Diagnostics {
    pub fn new(options: RenderOptions) -> Self {
        Diagnostics {
            entries: Vec::new(),
            options,
        }
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// All diagnostics in order of occurrence.
    pub fn all(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn is_fatal(&self, diagnostic: &Diagnostic) -> bool {
        self.options.escalates(diagnostic.kind)
    }

    /// True iff any recorded diagnostic is escalated by the active options.
    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(|d| self.is_fatal(d))
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

/// A fail-fast abort. Partial output is discarded.
#[derive(Debug, Error)]
#[error("render aborted: {reason}")]
pub struct RenderError {
    /// The first fatal diagnostic.
    pub reason: Diagnostic,
    /// Everything recorded up to and including `reason`.
    pub diagnostics: Vec<Diagnostic>,
}
