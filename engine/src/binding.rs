use indexmap::IndexMap;
use skeleton::template::{Path, PathSegment};

use crate::value::Value;

/// The outcome of resolving a placeholder path.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding<'a> {
    /// A scalar, already coerced to its canonical text.
    Scalar(String),
    Sequence(&'a [Value]),
    Mapping(&'a IndexMap<String, Value>),
    /// Missing key, out-of-range index, or null.
    Absent,
}

impl<'a> Binding<'a> {
    pub fn from_value(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => Binding::Absent,
            Some(Value::Sequence(items)) => Binding::Sequence(items),
            Some(Value::Mapping(m)) => Binding::Mapping(m),
            Some(scalar) => Binding::Scalar(scalar.to_string()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Binding::Scalar(_) => "scalar",
            Binding::Sequence(_) => "sequence",
            Binding::Mapping(_) => "mapping",
            Binding::Absent => "nothing",
        }
    }
}

/// A single scope level: the root data or one loop element.
#[derive(Debug, Clone)]
struct Frame<'a> {
    value: &'a Value,
    /// `item[2]` for loop elements, empty for the root.
    label: String,
}

/// The chain of active data scopes. Lookups search from the innermost frame
/// (current loop element) out to the root data.
#[derive(Debug, Clone)]
pub struct BindingContext<'a> {
    frames: Vec<Frame<'a>>,
}

impl<'a> BindingContext<'a> {
    pub fn new(root: &'a Value) -> Self {
        BindingContext {
            frames: vec![Frame {
                value: root,
                label: String::new(),
            }],
        }
    }

    /// Enter a loop element. Its fields shadow every outer scope.
    pub fn push(&mut self, label: String, value: &'a Value) {
        self.frames.push(Frame { value, label });
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Resolve a path. The head field is looked up innermost-first; only
    /// mapping frames can bind names. The first frame holding the head wins,
    /// even if the rest of the path then comes up empty.
    pub fn resolve(&self, path: &Path) -> Binding<'a> {
        let head = self.frames.iter().rev().find_map(|frame| {
            frame
                .value
                .as_mapping()
                .and_then(|m| m.get(path.head()))
        });
        Binding::from_value(head.and_then(|v| walk(v, path.tail())))
    }

    /// Loop trail for messages, e.g. `order[0] > line[3]`.
    pub fn trail(&self) -> Option<String> {
        let labels: Vec<&str> = self
            .frames
            .iter()
            .skip(1)
            .map(|f| f.label.as_str())
            .collect();
        (!labels.is_empty()).then(|| labels.join(" > "))
    }
}

fn walk<'a>(mut value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    for segment in segments {
        value = match (segment, value) {
            (PathSegment::Field(name), Value::Mapping(m)) => m.get(name)?,
            (PathSegment::Index(index), Value::Sequence(items)) => items.get(*index)?,
            _ => return None,
        };
    }
    Some(value)
}
