use serde::Deserialize;

use crate::diagnostics::DiagnosticKind;

/// Render configuration. Everything defaults to the tolerant behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Abort on the first fatal diagnostic.
    pub fail_fast: bool,
    /// Treat type mismatches (loop on a non-sequence, sequence used as text) as errors.
    pub strict: bool,
    /// Merge adjacent same-style runs before expansion.
    pub normalize_runs: bool,
}

impl RenderOptions {
    pub fn strict() -> Self {
        RenderOptions {
            strict: true,
            ..RenderOptions::default()
        }
    }

    pub fn with_fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Whether a diagnostic of this kind is fatal under these options.
    pub fn escalates(&self, kind: DiagnosticKind) -> bool {
        match kind {
            DiagnosticKind::MalformedLoop => self.fail_fast,
            DiagnosticKind::TypeMismatch => self.strict && self.fail_fast,
            DiagnosticKind::Unresolved
            | DiagnosticKind::EmptySequence
            | DiagnosticKind::SplitPlaceholder => false,
        }
    }
}
