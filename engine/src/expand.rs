use std::iter::Peekable;
use std::mem;
use std::ops::Range;
use std::vec;

use skeleton::Document;
use skeleton::document::{Block, Row};
use skeleton::template::{LoopRegion, Markable, Marker, MarkerError, Path, Segment, detect};

use crate::binding::{Binding, BindingContext};
use crate::diagnostics::{
    Diagnostic, DiagnosticKind, Diagnostics, Location, Part, RenderError, Step,
};
use crate::options::RenderOptions;
use crate::value::Value;

/// The result of a completed render.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub document: Document,
    /// Every diagnostic raised, in document order: body, headers, then footers.
    pub diagnostics: Vec<Diagnostic>,
}

/// Fill a skeleton with data.
///
/// The skeleton is consumed; the returned document is a fresh tree. On a
/// fatal diagnostic the partial output is dropped and the error carries every
/// diagnostic recorded so far.
pub fn render(
    mut skeleton: Document,
    data: &Value,
    options: &RenderOptions,
) -> Result<Rendered, RenderError> {
    let _span = tracing::debug_span!("render").entered();

    if options.normalize_runs {
        skeleton.normalize_runs();
    }

    let mut expander = Expander::new(*options);
    let mut ctx = BindingContext::new(data);

    skeleton.body = expander.expand_items(
        mem::take(&mut skeleton.body),
        &mut ctx,
        &Location::new(Part::Body),
    )?;
    for (n, header) in skeleton.headers.iter_mut().enumerate() {
        *header = expander.expand_items(mem::take(header), &mut ctx, &Location::new(Part::Header(n)))?;
    }
    for (n, footer) in skeleton.footers.iter_mut().enumerate() {
        *footer = expander.expand_items(mem::take(footer), &mut ctx, &Location::new(Part::Footer(n)))?;
    }

    let diagnostics = expander.diagnostics.into_vec();
    tracing::debug!(diagnostics = diagnostics.len(), "render complete");
    Ok(Rendered {
        document: skeleton,
        diagnostics,
    })
}

/// Items of a container that can be expanded: blocks of a story or cell,
/// rows of a table.
pub(crate) trait Expand: Markable + Clone {
    fn step(index: usize) -> Step;

    fn source_span(&self) -> Range<usize>;

    /// Expand one literal item against the current scope, appending the result.
    fn expand_into(
        self,
        expander: &mut Expander,
        ctx: &mut BindingContext<'_>,
        location: &Location,
        out: &mut Vec<Self>,
    ) -> Result<(), RenderError>;
}

impl Expand for Block {
    fn step(index: usize) -> Step {
        Step::Block(index)
    }

    fn source_span(&self) -> Range<usize> {
        self.span()
    }

    fn expand_into(
        self,
        expander: &mut Expander,
        ctx: &mut BindingContext<'_>,
        location: &Location,
        out: &mut Vec<Self>,
    ) -> Result<(), RenderError> {
        match self {
            Block::Paragraph(mut paragraph) => {
                if let Some(Ok(Marker::Table(path))) = Marker::parse(&paragraph.text()) {
                    if let Some(table) = expander.dynamic_table(&path, &paragraph, ctx, location)? {
                        out.push(Block::Table(table));
                    }
                    return Ok(());
                }
                expander.substitute_paragraph(&mut paragraph, ctx, location)?;
                out.push(Block::Paragraph(paragraph));
            }
            Block::Table(mut table) => {
                table.rows = expander.expand_items(mem::take(&mut table.rows), ctx, location)?;
                out.push(Block::Table(table));
            }
        }
        Ok(())
    }
}

impl Expand for Row {
    fn step(index: usize) -> Step {
        Step::Row(index)
    }

    fn source_span(&self) -> Range<usize> {
        self.cells
            .iter()
            .flat_map(|c| c.blocks.first())
            .map(Block::span)
            .next()
            .unwrap_or(0..0)
    }

    fn expand_into(
        mut self,
        expander: &mut Expander,
        ctx: &mut BindingContext<'_>,
        location: &Location,
        out: &mut Vec<Self>,
    ) -> Result<(), RenderError> {
        for (c, cell) in self.cells.iter_mut().enumerate() {
            let blocks = mem::take(&mut cell.blocks);
            cell.blocks = expander.expand_items(blocks, ctx, &location.child(Step::Cell(c)))?;
        }
        out.push(self);
        Ok(())
    }
}

/// Walks a skeleton and builds the output tree, collecting diagnostics.
pub(crate) struct Expander {
    options: RenderOptions,
    diagnostics: Diagnostics,
}

impl Expander {
    pub(crate) fn new(options: RenderOptions) -> Self {
        Expander {
            options,
            diagnostics: Diagnostics::new(options),
        }
    }

    pub(crate) fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Record a diagnostic. Returns `Err` if the active options make it fatal.
    pub(crate) fn report(
        &mut self,
        kind: DiagnosticKind,
        location: &Location,
        span: Range<usize>,
        message: String,
        ctx: &BindingContext<'_>,
    ) -> Result<(), RenderError> {
        let message = match ctx.trail() {
            Some(trail) => format!("{} (in {})", message, trail),
            None => message,
        };
        let diagnostic = Diagnostic {
            kind,
            location: location.clone(),
            span,
            message,
        };
        tracing::debug!(%kind, %location, "{}", diagnostic.message);

        let fatal = self.diagnostics.is_fatal(&diagnostic);
        self.diagnostics.record(diagnostic.clone());
        if fatal {
            tracing::warn!(%kind, %location, "aborting render on fatal diagnostic");
            return Err(RenderError {
                reason: diagnostic,
                diagnostics: mem::take(&mut self.diagnostics).into_vec(),
            });
        }
        Ok(())
    }

    /// Expand one container. Regions are detected on the skeleton items before
    /// anything is emitted, so expansion never shifts a later region. Marker
    /// errors are reported as expansion reaches their index.
    pub(crate) fn expand_items<T: Expand>(
        &mut self,
        items: Vec<T>,
        ctx: &mut BindingContext<'_>,
        location: &Location,
    ) -> Result<Vec<T>, RenderError> {
        let regions = detect(&items);

        if regions.is_passthrough() {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                item.expand_into(self, ctx, &location.child(T::step(index)), &mut out)?;
            }
            return Ok(out);
        }

        // Detection sorts errors by index.
        let errors: Vec<(MarkerError, Range<usize>)> = regions
            .errors
            .into_iter()
            .map(|error| {
                let span = items
                    .get(error.index)
                    .map(Expand::source_span)
                    .unwrap_or(0..0);
                (error, span)
            })
            .collect();
        let mut errors = errors.into_iter().peekable();

        // Literal items at the top level are moved out; loop bodies are
        // cloned once per element from the untouched slots.
        let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
        let mut out = Vec::with_capacity(slots.len());
        for segment in &regions.segments {
            match segment {
                Segment::Literal(range) => {
                    for index in range.clone() {
                        self.report_marker_errors::<T>(&mut errors, index, ctx, location)?;
                        if let Some(item) = slots.get_mut(index).and_then(Option::take) {
                            item.expand_into(self, ctx, &location.child(T::step(index)), &mut out)?;
                        }
                    }
                }
                Segment::Loop(region) => {
                    let last = if region.explicit_close {
                        region.span.end
                    } else {
                        region.span.end.saturating_sub(1).max(region.marker)
                    };
                    self.report_marker_errors::<T>(&mut errors, last, ctx, location)?;
                    self.expand_loop(region, &slots, ctx, location, &mut out)?;
                }
            }
        }
        self.report_marker_errors::<T>(&mut errors, usize::MAX, ctx, location)?;
        Ok(out)
    }

    /// Report pending marker errors up to and including item `through`.
    fn report_marker_errors<T: Expand>(
        &mut self,
        errors: &mut Peekable<vec::IntoIter<(MarkerError, Range<usize>)>>,
        through: usize,
        ctx: &BindingContext<'_>,
        location: &Location,
    ) -> Result<(), RenderError> {
        while let Some((error, span)) = errors.next_if(|(error, _)| error.index <= through) {
            self.report(
                DiagnosticKind::MalformedLoop,
                &location.child(T::step(error.index)),
                span,
                error.message,
                ctx,
            )?;
        }
        Ok(())
    }

    fn expand_loop<T: Expand>(
        &mut self,
        region: &LoopRegion,
        template: &[Option<T>],
        ctx: &mut BindingContext<'_>,
        location: &Location,
        out: &mut Vec<T>,
    ) -> Result<(), RenderError> {
        let marker_location = location.child(T::step(region.marker));
        let span = template
            .get(region.marker)
            .and_then(Option::as_ref)
            .map(Expand::source_span)
            .unwrap_or(0..0);

        let Some(items) = self.bind_sequence(&region.path, ctx, &marker_location, span)? else {
            return Ok(());
        };

        let name = region.name();
        tracing::debug!(name = %name, elements = items.len(), depth = ctx.depth(), "expanding loop");
        for (n, element) in items.iter().enumerate() {
            ctx.push(format!("{}[{}]", name, n), element);
            let result = self.emit_segments(&region.body, template, ctx, location, out);
            ctx.pop();
            result?;
        }
        Ok(())
    }

    /// Emit one copy of a loop body for the current element.
    fn emit_segments<T: Expand>(
        &mut self,
        segments: &[Segment],
        template: &[Option<T>],
        ctx: &mut BindingContext<'_>,
        location: &Location,
        out: &mut Vec<T>,
    ) -> Result<(), RenderError> {
        for segment in segments {
            match segment {
                Segment::Literal(range) => {
                    for index in range.clone() {
                        if let Some(item) = template.get(index).and_then(Option::as_ref) {
                            item.clone()
                                .expand_into(self, ctx, &location.child(T::step(index)), out)?;
                        }
                    }
                }
                Segment::Loop(region) => self.expand_loop(region, template, ctx, location, out)?,
            }
        }
        Ok(())
    }

    /// Resolve a loop or table path to a sequence. Anything else is reported
    /// and treated as empty.
    pub(crate) fn bind_sequence<'a>(
        &mut self,
        path: &Path,
        ctx: &BindingContext<'a>,
        location: &Location,
        span: Range<usize>,
    ) -> Result<Option<&'a [Value]>, RenderError> {
        match ctx.resolve(path) {
            Binding::Sequence(items) => {
                if items.is_empty() {
                    self.report(
                        DiagnosticKind::EmptySequence,
                        location,
                        span,
                        format!("`{}` is an empty sequence; nothing emitted", path),
                        ctx,
                    )?;
                }
                Ok(Some(items))
            }
            other => {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    location,
                    span,
                    format!("expected a sequence for `{}`, found {}", path, describe(&other)),
                    ctx,
                )?;
                Ok(None)
            }
        }
    }
}

fn describe(binding: &Binding<'_>) -> &'static str {
    match binding {
        Binding::Absent => "nothing",
        Binding::Scalar(_) => "a scalar",
        Binding::Sequence(_) => "a sequence",
        Binding::Mapping(_) => "a mapping",
    }
}
