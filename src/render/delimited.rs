//! Delimited-text row emitter.

use super::options::{ConvertOptions, MergedCells, Newline};
use super::value::render_value;
use crate::model::{CellCoordinate, DateEpoch, RowData, WorksheetMetadata};
use crate::shared_strings::SharedStrings;
use crate::sheet::RowHandler;
use crate::styles::StylesRegistry;
use std::borrow::Cow;
use std::collections::HashMap;

/// A field pending final assembly. Absent cells keep no text; they resolve
/// against the merged-cell cache once the full metadata is known.
#[derive(Debug)]
struct PendingField {
    column: u32,
    value: Option<String>,
}

#[derive(Debug)]
struct PendingRow {
    number: u32,
    fields: Vec<PendingField>,
}

/// Row handler that accumulates delimited text for one worksheet.
///
/// Rows are rendered as they stream in; merged-cell propagation is resolved
/// in [`finish`](DelimitedCollector::finish) by replaying rows in emitted
/// order, because the `mergeCells` section arrives after the sheet data.
/// A merged value therefore only propagates to cells at or after its
/// top-left corner in emission order.
pub struct DelimitedCollector<'a> {
    shared: &'a SharedStrings,
    styles: &'a StylesRegistry,
    epoch: DateEpoch,
    options: &'a ConvertOptions,
    metadata: WorksheetMetadata,
    rows: Vec<PendingRow>,
    errors: Vec<String>,
}

impl<'a> DelimitedCollector<'a> {
    /// Create a collector borrowing the workbook's resolved pools.
    pub fn new(
        shared: &'a SharedStrings,
        styles: &'a StylesRegistry,
        epoch: DateEpoch,
        options: &'a ConvertOptions,
    ) -> Self {
        Self {
            shared,
            styles,
            epoch,
            options,
            metadata: WorksheetMetadata::default(),
            rows: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Number of rows that will appear in the output.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Warnings reported by the reader.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Assemble the final output text, applying the merged-cell policy,
    /// newline conversion, and the BOM.
    pub fn finish(self) -> String {
        let propagate = self.options.merged == MergedCells::Propagate;
        let delimiter = self.options.delimiter as char;
        let mut merged_values: HashMap<String, String> = HashMap::new();
        let mut out = String::new();

        for row in &self.rows {
            let mut first = true;
            for field in &row.fields {
                if !first {
                    out.push(delimiter);
                }
                first = false;

                let coordinate = CellCoordinate::new(row.number, field.column);
                let text: Cow<'_, str> = match &field.value {
                    Some(value) => {
                        if propagate {
                            if let Some(range) = self.metadata.find_merged_range(coordinate) {
                                if range.top_left == coordinate {
                                    merged_values
                                        .insert(range.to_reference(), value.clone());
                                }
                            }
                        }
                        Cow::Borrowed(value.as_str())
                    }
                    None => {
                        if propagate {
                            self.metadata
                                .find_merged_range(coordinate)
                                .and_then(|range| merged_values.get(&range.to_reference()))
                                .map(|value| Cow::Borrowed(value.as_str()))
                                .unwrap_or(Cow::Borrowed(""))
                        } else {
                            Cow::Borrowed("")
                        }
                    }
                };

                push_escaped(&mut out, &text, self.options.delimiter);
            }
            out.push('\n');
        }

        let mut out = match self.options.newline {
            Newline::Lf => out,
            Newline::Crlf => out.replace('\n', "\r\n"),
        };
        if self.options.bom {
            out.insert(0, '\u{feff}');
        }
        out
    }
}

impl RowHandler for DelimitedCollector<'_> {
    fn on_row(&mut self, row: RowData) {
        if row.hidden && !self.options.include_hidden_rows {
            return;
        }

        if row.cells.is_empty() {
            self.rows.push(PendingRow {
                number: row.row_number,
                fields: Vec::new(),
            });
            return;
        }

        let max_column = row
            .cells
            .iter()
            .map(|c| c.coordinate.column)
            .max()
            .unwrap_or(0);

        // Cells arrive in document order, so a forward cursor locates the
        // cell for each column without rescanning.
        let mut fields = Vec::with_capacity(max_column as usize);
        let mut cursor = 0;
        for column in 1..=max_column {
            while cursor < row.cells.len() && row.cells[cursor].coordinate.column < column {
                cursor += 1;
            }

            if !self.options.include_hidden_columns && self.metadata.is_column_hidden(column) {
                continue;
            }

            let cell = row
                .cells
                .get(cursor)
                .filter(|c| c.coordinate.column == column);
            fields.push(PendingField {
                column,
                value: cell
                    .map(|c| render_value(c, self.shared, self.styles, self.epoch)),
            });
        }

        self.rows.push(PendingRow {
            number: row.row_number,
            fields,
        });
    }

    fn on_metadata(&mut self, metadata: &WorksheetMetadata) {
        self.metadata = metadata.clone();
    }

    fn on_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}

/// Append a field, quoting when it contains the delimiter, a quote, or a
/// line break, and doubling embedded quotes.
fn push_escaped(out: &mut String, field: &str, delimiter: u8) {
    let needs_quoting = field
        .bytes()
        .any(|b| b == delimiter || b == b'"' || b == b'\n' || b == b'\r');

    if !needs_quoting {
        out.push_str(field);
        return;
    }

    out.push('"');
    for c in field.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}
