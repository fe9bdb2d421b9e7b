use skeleton::document::{Cell, ColumnAlignment, Paragraph, Row, Run, RunStyle, Table};
use skeleton::template::Path;

use crate::binding::BindingContext;
use crate::diagnostics::{DiagnosticKind, Location, RenderError};
use crate::expand::Expander;
use crate::value::Value;

/// Style name given to generated tables.
pub const GENERATED_TABLE_STYLE: &str = "Table Grid";

impl Expander {
    /// Build the table for a `{{TABLE:path}}` paragraph.
    ///
    /// Columns come from the keys of the first element, in order. Elements
    /// missing a key get an empty cell. `None` drops the directive paragraph.
    pub(crate) fn dynamic_table(
        &mut self,
        path: &Path,
        directive: &Paragraph,
        ctx: &BindingContext<'_>,
        location: &Location,
    ) -> Result<Option<Table>, RenderError> {
        let span = directive.span.clone();
        let Some(items) = self.bind_sequence(path, ctx, location, span.clone())? else {
            return Ok(None);
        };
        let Some(first) = items.first() else {
            return Ok(None);
        };
        let Some(columns) = first.as_mapping() else {
            self.report(
                DiagnosticKind::TypeMismatch,
                location,
                span,
                format!(
                    "table `{}` needs a sequence of mappings, found a sequence of {}s",
                    path,
                    first.type_name()
                ),
                ctx,
            )?;
            return Ok(None);
        };
        let keys: Vec<&String> = columns.keys().collect();

        let mut rows = Vec::with_capacity(items.len() + 1);
        rows.push(Row {
            header: true,
            cells: keys
                .iter()
                .map(|key| Cell::from_runs(vec![Run::new(column_title(key), RunStyle::bold())]))
                .collect(),
        });
        for item in items {
            let fields = item.as_mapping();
            rows.push(Row {
                header: false,
                cells: keys
                    .iter()
                    .map(|key| {
                        let text = fields
                            .and_then(|f| f.get(key.as_str()))
                            .map(Value::to_string)
                            .unwrap_or_default();
                        Cell::from_runs(vec![Run::plain(text)])
                    })
                    .collect(),
            });
        }

        tracing::debug!(%path, columns = keys.len(), rows = items.len(), "generated table");
        Ok(Some(Table {
            style: Some(GENERATED_TABLE_STYLE.to_string()),
            alignments: vec![ColumnAlignment::None; keys.len()],
            rows,
            span,
        }))
    }
}

/// `unit_price` becomes `UNIT PRICE`.
fn column_title(key: &str) -> String {
    key.replace('_', " ").to_uppercase()
}
