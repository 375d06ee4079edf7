//! Streaming worksheet reader.
//!
//! A single pass over the worksheet part, pushing one [`RowData`] per `row`
//! element to a handler. Structural sections (`cols`, `mergeCells`) are
//! folded into [`WorksheetMetadata`], delivered after each section completes
//! and once more at end of stream; the latest delivery is authoritative.
//! Rows are never accumulated here.

use crate::error::{Error, Result};
use crate::model::{
    CellCoordinate, CellData, CellValue, ColumnInfo, MergedRange, RowData, WorksheetMetadata,
    MAX_COLUMN,
};
use crate::package::OpcPackage;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Receiver for streamed worksheet content.
pub trait RowHandler {
    /// One call per encountered `row` element, empty rows included.
    fn on_row(&mut self, row: RowData);

    /// Structural metadata; the latest delivery supersedes earlier ones.
    fn on_metadata(&mut self, metadata: &WorksheetMetadata);

    /// Non-fatal warnings.
    fn on_error(&mut self, message: &str);
}

/// Cell type tokens from the `t` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    Boolean,
    Error,
    Number,
    SharedString,
    String,
    InlineString,
    Unknown,
}

/// Pull parser over one worksheet part.
pub struct SheetReader;

impl SheetReader {
    /// Stream the worksheet at the given package path into the handler.
    pub fn read_sheet(
        package: &OpcPackage,
        path: &str,
        handler: &mut dyn RowHandler,
    ) -> Result<()> {
        let xml = package.read_part(path)?;
        Self::read_xml(&xml, path, handler)
    }

    /// Stream worksheet XML content into the handler.
    ///
    /// Parse failures notify the handler via `on_error` and stop row
    /// emission for the sheet.
    pub fn read_xml(xml: &str, part: &str, handler: &mut dyn RowHandler) -> Result<()> {
        let result = stream_worksheet(xml, part, handler);
        if let Err(ref err) = result {
            handler.on_error(&err.to_string());
        }
        result
    }
}

fn stream_worksheet(xml: &str, part: &str, handler: &mut dyn RowHandler) -> Result<()> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut metadata = WorksheetMetadata::default();

    loop {
        match read_event(&mut reader, &mut buf, part)? {
            Event::Start(e) => match e.name().as_ref() {
                b"row" => {
                    let row = parse_row(&mut reader, &e, part)?;
                    handler.on_row(row);
                }
                b"mergeCells" => {
                    parse_merge_cells(&mut reader, &mut metadata, part)?;
                    handler.on_metadata(&metadata);
                }
                b"cols" => {
                    parse_columns(&mut reader, &mut metadata, part)?;
                    handler.on_metadata(&metadata);
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"row" => {
                    let (row_number, hidden, _) = row_attributes(&e);
                    handler.on_row(RowData {
                        row_number,
                        hidden,
                        cells: Vec::new(),
                    });
                }
                b"cols" | b"mergeCells" => handler.on_metadata(&metadata),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    handler.on_metadata(&metadata);
    Ok(())
}

fn read_event<'b>(
    reader: &mut Reader<&[u8]>,
    buf: &'b mut Vec<u8>,
    part: &str,
) -> Result<Event<'b>> {
    reader.read_event_into(buf).map_err(|e| Error::InvalidXml {
        part: part.to_string(),
        detail: format!("{} at byte {}", e, reader.buffer_position()),
    })
}

/// Pull `r`, `hidden`, and the `spans` capacity hint off a row element.
fn row_attributes(e: &BytesStart<'_>) -> (u32, bool, usize) {
    let mut row_number = 1u32;
    let mut hidden = false;
    let mut span_hint = 0usize;

    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => {
                if let Ok(parsed) = String::from_utf8_lossy(&attr.value).parse::<u32>() {
                    if parsed > 0 {
                        row_number = parsed;
                    }
                }
            }
            b"hidden" => {
                hidden = matches!(attr.value.as_ref(), b"1" | b"true");
            }
            b"spans" => {
                let value = String::from_utf8_lossy(&attr.value);
                if let Some((first, last)) = value.split_once(':') {
                    if let (Ok(first), Ok(last)) = (first.parse::<u32>(), last.parse::<u32>()) {
                        if last >= first {
                            span_hint = ((last - first + 1) as usize).min(MAX_COLUMN as usize);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    (row_number, hidden, span_hint)
}

fn parse_row(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>, part: &str) -> Result<RowData> {
    let (row_number, hidden, span_hint) = row_attributes(start);

    let mut row = RowData {
        row_number,
        hidden,
        cells: Vec::with_capacity(span_hint),
    };

    let mut buf = Vec::new();
    loop {
        match read_event(reader, &mut buf, part)? {
            Event::Start(e) if e.name().as_ref() == b"c" => {
                if let Some(cell) = parse_cell(reader, &e, false, part)? {
                    row.cells.push(cell);
                }
            }
            Event::Empty(e) if e.name().as_ref() == b"c" => {
                if let Some(cell) = parse_cell(reader, &e, true, part)? {
                    row.cells.push(cell);
                }
            }
            Event::End(e) if e.name().as_ref() == b"row" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(row)
}

/// Parse one `c` element. Cells without a resolvable reference are dropped.
fn parse_cell(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    is_empty_element: bool,
    part: &str,
) -> Result<Option<CellData>> {
    let mut coordinate: Option<CellCoordinate> = None;
    let mut cell_type = CellType::Number;
    let mut style_index = 0u32;

    for attr in start.attributes().flatten() {
        match attr.key.as_ref() {
            b"r" => {
                coordinate =
                    CellCoordinate::from_reference(&String::from_utf8_lossy(&attr.value));
            }
            b"t" => {
                cell_type = match attr.value.as_ref() {
                    b"b" => CellType::Boolean,
                    b"e" => CellType::Error,
                    b"n" => CellType::Number,
                    b"s" => CellType::SharedString,
                    b"str" => CellType::String,
                    b"inlineStr" => CellType::InlineString,
                    _ => CellType::Unknown,
                };
            }
            b"s" => {
                style_index = String::from_utf8_lossy(&attr.value).parse().unwrap_or(0);
            }
            _ => {}
        }
    }

    let mut value = CellValue::Empty;

    if !is_empty_element {
        let mut buf = Vec::new();
        loop {
            match read_event(reader, &mut buf, part)? {
                Event::Start(e) if e.name().as_ref() == b"v" => {
                    let raw = read_element_text(reader, b"v", part)?;
                    value = decode_value(&raw, cell_type);
                }
                Event::Start(e) if e.name().as_ref() == b"is" => {
                    // An inline-string body wins over whatever the t
                    // attribute claimed.
                    value = CellValue::InlineString(parse_inline_string(reader, part)?);
                }
                Event::End(e) if e.name().as_ref() == b"c" => break,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
    }

    Ok(coordinate.map(|coordinate| CellData {
        coordinate,
        value,
        style_index,
    }))
}

/// Decode a `v` body according to the cell type. Unparseable numbers and
/// shared-string indices degrade to empty without failing the sheet.
fn decode_value(raw: &str, cell_type: CellType) -> CellValue {
    if raw.is_empty() {
        return CellValue::Empty;
    }

    match cell_type {
        CellType::Boolean => CellValue::Boolean(raw == "1"),
        CellType::Number => match raw.parse::<f64>() {
            Ok(number) => CellValue::Number(number),
            Err(_) => CellValue::Empty,
        },
        CellType::SharedString => match raw.parse::<u32>() {
            Ok(index) => CellValue::SharedString(index),
            Err(_) => CellValue::Empty,
        },
        CellType::Error => CellValue::Error(raw.to_string()),
        CellType::String => CellValue::String(raw.to_string()),
        CellType::InlineString => CellValue::InlineString(raw.to_string()),
        CellType::Unknown => CellValue::String(raw.to_string()),
    }
}

/// Collect the text content of the current element up to its end tag.
fn read_element_text(reader: &mut Reader<&[u8]>, end: &[u8], part: &str) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match read_event(reader, &mut buf, part)? {
            Event::Text(e) => text.push_str(&e.unescape().unwrap_or_default()),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::End(e) if e.name().as_ref() == end => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

/// Flatten an `is` body to plain text: `t` children directly under `is` or
/// under rich-text runs contribute; phonetic and property elements do not.
fn parse_inline_string(reader: &mut Reader<&[u8]>, part: &str) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut capture = false;

    loop {
        match read_event(reader, &mut buf, part)? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if name == b"t" {
                    capture = matches!(stack.last().map(Vec::as_slice), None | Some(b"r"));
                }
                stack.push(name);
            }
            Event::Text(e) => {
                if capture {
                    text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Event::CData(e) => {
                if capture {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => {
                if stack.is_empty() && e.name().as_ref() == b"is" {
                    break;
                }
                if e.name().as_ref() == b"t" {
                    capture = false;
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

fn parse_merge_cells(
    reader: &mut Reader<&[u8]>,
    metadata: &mut WorksheetMetadata,
    part: &str,
) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match read_event(reader, &mut buf, part)? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"mergeCell" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"ref" {
                        let reference = String::from_utf8_lossy(&attr.value);
                        if let Some(range) = MergedRange::from_reference(&reference) {
                            metadata.merged_cells.push(range);
                        }
                    }
                }
            }
            Event::End(e) if e.name().as_ref() == b"mergeCells" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn parse_columns(
    reader: &mut Reader<&[u8]>,
    metadata: &mut WorksheetMetadata,
    part: &str,
) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match read_event(reader, &mut buf, part)? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"col" => {
                let mut min = 1u32;
                let mut max = 1u32;
                let mut hidden = false;
                let mut width = None;

                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value);
                    match attr.key.as_ref() {
                        b"min" => min = value.parse().unwrap_or(1),
                        b"max" => max = value.parse().unwrap_or(1),
                        b"hidden" => hidden = matches!(attr.value.as_ref(), b"1" | b"true"),
                        b"width" => width = value.parse().ok(),
                        _ => {}
                    }
                }

                let max = max.min(MAX_COLUMN);
                for column in min.max(1)..=max {
                    metadata.columns.push(ColumnInfo {
                        column,
                        hidden,
                        width,
                    });
                }
            }
            Event::End(e) if e.name().as_ref() == b"cols" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collecting {
        rows: Vec<RowData>,
        metadata: WorksheetMetadata,
        deliveries: usize,
        errors: Vec<String>,
    }

    impl RowHandler for Collecting {
        fn on_row(&mut self, row: RowData) {
            self.rows.push(row);
        }
        fn on_metadata(&mut self, metadata: &WorksheetMetadata) {
            self.metadata = metadata.clone();
            self.deliveries += 1;
        }
        fn on_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    fn read(xml: &str) -> Collecting {
        let mut handler = Collecting::default();
        SheetReader::read_xml(xml, "xl/worksheets/sheet1.xml", &mut handler).unwrap();
        handler
    }

    #[test]
    fn test_cell_types_decoded() {
        let xml = r#"<worksheet><sheetData>
            <row r="1">
                <c r="A1" t="s"><v>7</v></c>
                <c r="B1"><v>3.14</v></c>
                <c r="C1" t="b"><v>1</v></c>
                <c r="D1" t="e"><v>#REF!</v></c>
                <c r="E1" t="str"><v>result</v></c>
                <c r="F1" t="inlineStr"><is><t>inline</t></is></c>
                <c r="G1"/>
            </row>
        </sheetData></worksheet>"#;

        let handler = read(xml);
        assert_eq!(handler.rows.len(), 1);
        let cells = &handler.rows[0].cells;
        assert_eq!(cells.len(), 7);

        assert_eq!(cells[0].value, CellValue::SharedString(7));
        assert_eq!(cells[1].value, CellValue::Number(3.14));
        assert_eq!(cells[2].value, CellValue::Boolean(true));
        assert_eq!(cells[3].value, CellValue::Error("#REF!".to_string()));
        assert_eq!(cells[4].value, CellValue::String("result".to_string()));
        assert_eq!(cells[5].value, CellValue::InlineString("inline".to_string()));
        assert_eq!(cells[6].value, CellValue::Empty);
    }

    #[test]
    fn test_boolean_false_and_unknown_type() {
        let xml = r#"<worksheet><sheetData>
            <row r="1">
                <c r="A1" t="b"><v>0</v></c>
                <c r="B1" t="banana"><v>5</v></c>
            </row>
        </sheetData></worksheet>"#;

        let handler = read(xml);
        let cells = &handler.rows[0].cells;
        assert_eq!(cells[0].value, CellValue::Boolean(false));
        assert_eq!(cells[1].value, CellValue::String("5".to_string()));
    }

    #[test]
    fn test_unparseable_values_degrade_to_empty() {
        let xml = r#"<worksheet><sheetData>
            <row r="1">
                <c r="A1"><v>not-a-number</v></c>
                <c r="B1" t="s"><v>-3</v></c>
                <c r="C1" t="s"><v>abc</v></c>
            </row>
        </sheetData></worksheet>"#;

        let handler = read(xml);
        let cells = &handler.rows[0].cells;
        assert_eq!(cells[0].value, CellValue::Empty);
        assert_eq!(cells[1].value, CellValue::Empty);
        assert_eq!(cells[2].value, CellValue::Empty);
    }

    #[test]
    fn test_inline_string_wins_over_type_attribute() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" t="n"><is><r><t>rich </t></r><r><t>run</t></r></is></c></row>
        </sheetData></worksheet>"#;

        let handler = read(xml);
        assert_eq!(
            handler.rows[0].cells[0].value,
            CellValue::InlineString("rich run".to_string())
        );
    }

    #[test]
    fn test_row_attributes() {
        let xml = r#"<worksheet><sheetData>
            <row r="4" hidden="1" spans="1:3"><c r="A4" s="2"><v>1</v></c></row>
            <row><c r="A1"><v>2</v></c></row>
            <row r="9"/>
        </sheetData></worksheet>"#;

        let handler = read(xml);
        assert_eq!(handler.rows.len(), 3);

        assert_eq!(handler.rows[0].row_number, 4);
        assert!(handler.rows[0].hidden);
        assert_eq!(handler.rows[0].cells[0].style_index, 2);

        // missing r defaults to 1, not hidden
        assert_eq!(handler.rows[1].row_number, 1);
        assert!(!handler.rows[1].hidden);

        // empty rows are still reported
        assert_eq!(handler.rows[2].row_number, 9);
        assert!(handler.rows[2].cells.is_empty());
    }

    #[test]
    fn test_cells_without_reference_are_dropped() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c><v>5</v></c><c r="B1"><v>6</v></c></row>
        </sheetData></worksheet>"#;

        let handler = read(xml);
        assert_eq!(handler.rows[0].cells.len(), 1);
        assert_eq!(handler.rows[0].cells[0].coordinate.column, 2);
    }

    #[test]
    fn test_merge_cells_metadata() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1"><v>1</v></c></row>
        </sheetData>
        <mergeCells count="2">
            <mergeCell ref="A1:B2"/>
            <mergeCell ref="C3:A1"/>
        </mergeCells></worksheet>"#;

        let handler = read(xml);
        // the inverted range is rejected
        assert_eq!(handler.metadata.merged_cells.len(), 1);
        assert_eq!(handler.metadata.merged_cells[0].to_reference(), "A1:B2");
        // after mergeCells and once more at end of stream
        assert!(handler.deliveries >= 2);
    }

    #[test]
    fn test_column_range_expansion() {
        let xml = r#"<worksheet>
        <cols>
            <col min="2" max="4" hidden="1" width="8.43"/>
            <col min="6" max="6"/>
        </cols>
        <sheetData/></worksheet>"#;

        let handler = read(xml);
        assert_eq!(handler.metadata.columns.len(), 4);
        assert!(handler.metadata.is_column_hidden(2));
        assert!(handler.metadata.is_column_hidden(3));
        assert!(handler.metadata.is_column_hidden(4));
        assert!(!handler.metadata.is_column_hidden(6));
        assert_eq!(handler.metadata.columns[0].width, Some(8.43));
    }

    #[test]
    fn test_final_metadata_delivery() {
        let handler = read("<worksheet><sheetData/></worksheet>");
        assert!(handler.deliveries >= 1);
        assert!(handler.rows.is_empty());
    }

    #[test]
    fn test_parse_error_notifies_handler() {
        let xml = "<worksheet><sheetData><row r=\"1\"></sheetData></worksheet>";
        let mut handler = Collecting::default();
        let result = SheetReader::read_xml(xml, "xl/worksheets/sheet1.xml", &mut handler);

        assert!(matches!(result, Err(Error::InvalidXml { .. })));
        assert_eq!(handler.errors.len(), 1);
    }
}
