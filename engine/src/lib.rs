//! Fills document skeletons with structured data.
//!
//! A skeleton is a [`skeleton::Document`] holding `{{path}}` placeholders and
//! `{{LOOP:name}}` / `{{ENDLOOP}}` block markers. [`render`] resolves each
//! placeholder against a [`Value`] tree, repeats loop regions once per element
//! of the bound sequence, and reports everything it could not fill as
//! [`Diagnostic`]s instead of failing.

pub mod binding;
pub mod diagnostics;
mod expand;
pub mod options;
mod substitute;
pub mod table;
mod validate;
pub mod value;

pub use binding::{Binding, BindingContext};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Location, Part, RenderError, Step};
pub use expand::{Rendered, render};
pub use options::RenderOptions;
pub use validate::validate;
pub use value::Value;
