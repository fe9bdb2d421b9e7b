use std::ops::Range;

use skeleton::document::Paragraph;
use skeleton::template::scanner::may_contain_placeholder;
use skeleton::template::{Marker, Path, Placeholder, Token, scan};

use crate::binding::{Binding, BindingContext};
use crate::diagnostics::{DiagnosticKind, Location, RenderError};
use crate::expand::Expander;

/// How the text between a placeholder's braces is understood.
pub(crate) enum Reference {
    Path(Path),
    /// A loop or table directive outside a block of its own.
    Directive,
    Invalid,
}

pub(crate) fn classify(placeholder: &Placeholder<'_>) -> Reference {
    let inner = placeholder.inner();
    if let Some(path) = Path::parse(inner) {
        Reference::Path(path)
    } else if Marker::from_reference(inner).is_some() {
        Reference::Directive
    } else {
        Reference::Invalid
    }
}

pub(crate) fn directive_message(raw: &str) -> String {
    format!("`{}` must be the only content of its paragraph", raw)
}

pub(crate) fn invalid_path_message(raw: &str) -> String {
    format!("`{}` is not a valid placeholder path", raw)
}

pub(crate) fn split_message(raw: &str) -> String {
    format!(
        "placeholder `{}` spans several runs and cannot match; merge the runs or enable run normalization",
        raw
    )
}

/// Placeholders in the paragraph's joined text that straddle a run boundary.
pub(crate) fn split_placeholders(paragraph: &Paragraph) -> Vec<String> {
    if paragraph.runs.len() < 2 {
        return Vec::new();
    }
    let mut boundaries = Vec::with_capacity(paragraph.runs.len());
    let mut offset = 0;
    for run in &paragraph.runs[..paragraph.runs.len() - 1] {
        offset += run.text().len();
        boundaries.push(offset);
    }

    let text = paragraph.text();
    scan(&text)
        .filter_map(|token| match token {
            Token::Placeholder(p) => {
                let span = p.span();
                boundaries
                    .iter()
                    .any(|b| span.start < *b && *b < span.end)
                    .then(|| p.raw.to_string())
            }
            Token::Literal(_) => None,
        })
        .collect()
}

impl Expander {
    /// Substitute every placeholder of every run in place. Run styles are kept.
    pub(crate) fn substitute_paragraph(
        &mut self,
        paragraph: &mut Paragraph,
        ctx: &BindingContext<'_>,
        location: &Location,
    ) -> Result<(), RenderError> {
        let span = paragraph.span.clone();

        for raw in split_placeholders(paragraph) {
            self.report(
                DiagnosticKind::SplitPlaceholder,
                location,
                span.clone(),
                split_message(&raw),
                ctx,
            )?;
        }

        for run in paragraph.runs.iter_mut() {
            if !may_contain_placeholder(run.text()) {
                continue;
            }
            if let Some(text) = self.substitute_text(run.text(), ctx, location, &span)? {
                run.set_text(text);
            }
        }
        Ok(())
    }

    /// Returns the new text, or `None` if nothing was replaced.
    fn substitute_text(
        &mut self,
        text: &str,
        ctx: &BindingContext<'_>,
        location: &Location,
        span: &Range<usize>,
    ) -> Result<Option<String>, RenderError> {
        let mut out = String::with_capacity(text.len());
        let mut changed = false;

        for token in scan(text) {
            match token {
                Token::Literal(s) => out.push_str(s),
                Token::Placeholder(placeholder) => {
                    match self.resolve_placeholder(&placeholder, ctx, location, span)? {
                        Some(value) => {
                            out.push_str(&value);
                            changed = true;
                        }
                        None => out.push_str(placeholder.raw),
                    }
                }
            }
        }

        Ok(changed.then_some(out))
    }

    /// Text to put in place of a placeholder. `None` leaves it verbatim.
    fn resolve_placeholder(
        &mut self,
        placeholder: &Placeholder<'_>,
        ctx: &BindingContext<'_>,
        location: &Location,
        span: &Range<usize>,
    ) -> Result<Option<String>, RenderError> {
        let path = match classify(placeholder) {
            Reference::Path(path) => path,
            Reference::Directive => {
                self.report(
                    DiagnosticKind::MalformedLoop,
                    location,
                    span.clone(),
                    directive_message(placeholder.raw),
                    ctx,
                )?;
                return Ok(None);
            }
            Reference::Invalid => {
                self.report(
                    DiagnosticKind::Unresolved,
                    location,
                    span.clone(),
                    invalid_path_message(placeholder.raw),
                    ctx,
                )?;
                return Ok(None);
            }
        };

        match ctx.resolve(&path) {
            Binding::Scalar(text) => {
                tracing::trace!(%path, %text, "substituted placeholder");
                Ok(Some(text))
            }
            Binding::Absent => {
                self.report(
                    DiagnosticKind::Unresolved,
                    location,
                    span.clone(),
                    format!("no value bound to `{}`", path),
                    ctx,
                )?;
                Ok(None)
            }
            composite if self.options().strict => {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    location,
                    span.clone(),
                    format!("`{}` is a {}, not a scalar", path, composite.type_name()),
                    ctx,
                )?;
                Ok(None)
            }
            composite => match coerce(&composite) {
                Some(text) => Ok(Some(text)),
                None => {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        location,
                        span.clone(),
                        format!(
                            "`{}` is a {} with no scalar text; left verbatim",
                            path,
                            composite.type_name()
                        ),
                        ctx,
                    )?;
                    Ok(None)
                }
            },
        }
    }
}

/// Tolerant text for a composite used as a scalar: a sequence of scalars
/// joins with `, `. Anything else has no text.
fn coerce(binding: &Binding<'_>) -> Option<String> {
    let Binding::Sequence(items) = binding else {
        return None;
    };
    items
        .iter()
        .map(|v| v.scalar_text())
        .collect::<Option<Vec<_>>>()
        .map(|texts| texts.join(", "))
}
