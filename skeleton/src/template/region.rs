use std::ops::Range;

use crate::template::marker::{Markable, Marker};
use crate::template::path::Path;

/// One partition of a container's items.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Items emitted once, with placeholders substituted.
    Literal(Range<usize>),
    /// Items repeated once per element of a bound sequence.
    Loop(LoopRegion),
}

/// A loop region. Indices refer to the container the region was detected in,
/// captured before any expansion, so regions never shift each other.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopRegion {
    pub path: Path,
    /// Index of the opening marker item (discarded from output).
    pub marker: usize,
    /// Items governed by the region, markers excluded. `start..end`, end exclusive.
    pub span: Range<usize>,
    /// The region's content, partitioned again (nested loops appear here).
    pub body: Vec<Segment>,
    /// True if the region was closed by `{{ENDLOOP}}`.
    pub explicit_close: bool,
}

impl LoopRegion {
    pub fn name(&self) -> String {
        self.path.to_string()
    }
}

/// Structural problem found while detecting regions.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerError {
    /// Index of the offending item in its container.
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Regions {
    pub segments: Vec<Segment>,
    pub errors: Vec<MarkerError>,
}

impl Regions {
    pub fn has_loops(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Loop(_)))
    }

    /// True if detection left every item in place: no loops, no dropped markers.
    pub fn is_passthrough(&self) -> bool {
        !self.has_loops() && self.errors.is_empty()
    }
}

struct Frame {
    /// `None` for the container root.
    path: Option<Path>,
    marker: usize,
    body: Vec<Segment>,
    literal_start: Option<usize>,
}

impl Frame {
    fn root() -> Self {
        Frame {
            path: None,
            marker: 0,
            body: Vec::new(),
            literal_start: None,
        }
    }

    fn open(path: Path, marker: usize) -> Self {
        Frame {
            path: Some(path),
            marker,
            body: Vec::new(),
            literal_start: None,
        }
    }

    fn push_item(&mut self, index: usize) {
        self.literal_start.get_or_insert(index);
    }

    fn flush(&mut self, end: usize) {
        if let Some(start) = self.literal_start.take() {
            self.body.push(Segment::Literal(start..end));
        }
    }
}

/// Partition a container's items into literal and loop segments.
///
/// A container without any `{{ENDLOOP}}` closes each loop implicitly at the
/// next loop marker or at the end of the container. Once a container holds an
/// `{{ENDLOOP}}`, loops nest and each `{{ENDLOOP}}` closes the innermost open
/// loop. At the end of the container the outermost open loop closes silently;
/// nested loops still open there are reported and closed at the end of their
/// enclosing span.
pub fn detect<T: Markable>(items: &[T]) -> Regions {
    let markers: Vec<Option<Result<Marker, String>>> = items.iter().map(Markable::marker).collect();
    let explicit = markers
        .iter()
        .any(|m| matches!(m, Some(Ok(Marker::Close))));

    let mut stack = vec![Frame::root()];
    let mut errors = Vec::new();

    for (index, marker) in markers.into_iter().enumerate() {
        match marker {
            None | Some(Ok(Marker::Table(_))) => top(&mut stack).push_item(index),
            Some(Err(message)) => {
                top(&mut stack).flush(index);
                errors.push(MarkerError { index, message });
            }
            Some(Ok(Marker::Open(path))) => {
                top(&mut stack).flush(index);
                if !explicit && stack.len() > 1 {
                    close_top(&mut stack, index, false);
                }
                stack.push(Frame::open(path, index));
            }
            Some(Ok(Marker::Close)) => {
                top(&mut stack).flush(index);
                if stack.len() > 1 {
                    close_top(&mut stack, index, true);
                } else {
                    errors.push(MarkerError {
                        index,
                        message: "`{{ENDLOOP}}` without a matching `{{LOOP:...}}`".to_string(),
                    });
                }
            }
        }
    }

    let end = items.len();
    top(&mut stack).flush(end);
    while stack.len() > 1 {
        if explicit && stack.len() > 2 {
            let frame = top(&mut stack);
            let name = frame.path.as_ref().map(Path::to_string).unwrap_or_default();
            errors.push(MarkerError {
                index: frame.marker,
                message: format!(
                    "nested loop `{}` has no `{{{{ENDLOOP}}}}`; closing it at the end of the enclosing loop",
                    name
                ),
            });
        }
        close_top(&mut stack, end, false);
    }

    errors.sort_by_key(|e| e.index);
    let segments = stack.pop().map(|root| root.body).unwrap_or_default();
    tracing::debug!(
        items = items.len(),
        segments = segments.len(),
        errors = errors.len(),
        "detected loop regions"
    );
    Regions { segments, errors }
}

fn top(stack: &mut [Frame]) -> &mut Frame {
    let last = stack.len() - 1;
    &mut stack[last]
}

fn close_top(stack: &mut Vec<Frame>, end: usize, explicit_close: bool) {
    if stack.len() < 2 {
        return;
    }
    let Some(mut frame) = stack.pop() else {
        return;
    };
    frame.flush(end);
    let Some(path) = frame.path else {
        return;
    };
    let region = LoopRegion {
        path,
        marker: frame.marker,
        span: frame.marker + 1..end,
        body: frame.body,
        explicit_close,
    };
    top(stack).body.push(Segment::Loop(region));
}
