//! Data model for workbook content.
//!
//! These structures represent parsed worksheet content in a format-agnostic
//! way: the sheet reader produces them and the delimited-text renderer
//! consumes them.

use serde::{Deserialize, Serialize};

/// Largest legal 1-based row number (XFD1048576 is the last cell).
pub const MAX_ROW: u32 = 1_048_576;

/// Largest legal 1-based column number (column XFD).
pub const MAX_COLUMN: u32 = 16_384;

/// A 1-based (row, column) cell position.
///
/// The textual form is `[A-Z]+[1-9][0-9]*` where the letter prefix is
/// bijective base-26 (A=1, Z=26, AA=27).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellCoordinate {
    /// 1-based row number
    pub row: u32,
    /// 1-based column number
    pub column: u32,
}

impl CellCoordinate {
    /// Create a coordinate from 1-based row and column numbers.
    pub fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Parse an A1-style reference like `BC42`.
    ///
    /// Returns `None` for anything that is not a well-formed reference
    /// within the sheet bounds.
    pub fn from_reference(reference: &str) -> Option<Self> {
        let bytes = reference.as_bytes();
        if bytes.is_empty() {
            return None;
        }

        let mut column: u64 = 0;
        let mut i = 0;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            let c = bytes[i].to_ascii_uppercase();
            column = column * 26 + u64::from(c - b'A' + 1);
            if column > u64::from(MAX_COLUMN) {
                return None;
            }
            i += 1;
        }
        if column == 0 || i == bytes.len() {
            return None;
        }

        if !(b'1'..=b'9').contains(&bytes[i]) {
            return None;
        }
        let mut row: u64 = 0;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            row = row * 10 + u64::from(bytes[i] - b'0');
            if row > u64::from(MAX_ROW) {
                return None;
            }
            i += 1;
        }
        if i != bytes.len() || row == 0 {
            return None;
        }

        Some(Self {
            row: row as u32,
            column: column as u32,
        })
    }

    /// Render the A1-style reference for this coordinate.
    pub fn to_reference(self) -> String {
        let mut letters = [0u8; 8];
        let mut n = 0;
        let mut col = self.column;
        while col > 0 {
            col -= 1;
            letters[n] = b'A' + (col % 26) as u8;
            col /= 26;
            n += 1;
        }

        let mut out = String::with_capacity(n + 8);
        for i in (0..n).rev() {
            out.push(letters[i] as char);
        }
        out.push_str(&self.row.to_string());
        out
    }
}

/// A parsed cell value.
///
/// Shared-string cells keep their pool index; resolution happens at
/// emission time against the workbook's string pool.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    /// No value element was present.
    #[default]
    Empty,
    /// `t="b"`, raw value "0"/"1".
    Boolean(bool),
    /// `t="n"` or no type attribute; may be a date serial.
    Number(f64),
    /// `t="s"`, unresolved pool index.
    SharedString(u32),
    /// `t="inlineStr"`, resolved while parsing.
    InlineString(String),
    /// `t="str"`, a cached formula result.
    String(String),
    /// `t="e"`, an error code such as `#REF!`.
    Error(String),
}

impl CellValue {
    /// True when no value element was present.
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// A parsed cell: position, value, and style index.
#[derive(Debug, Clone, PartialEq)]
pub struct CellData {
    /// Where the cell sits in the sheet
    pub coordinate: CellCoordinate,
    /// The decoded value
    pub value: CellValue,
    /// 0-based index into the styles registry's cellXfs table
    pub style_index: u32,
}

/// One worksheet row as encountered in the stream.
#[derive(Debug, Clone, Default)]
pub struct RowData {
    /// 1-based row number
    pub row_number: u32,
    /// Whether the row is marked hidden
    pub hidden: bool,
    /// Cells in document order (strictly increasing column)
    pub cells: Vec<CellData>,
}

impl RowData {
    /// Find the cell occupying the given 1-based column, if any.
    pub fn find_cell(&self, column: u32) -> Option<&CellData> {
        self.cells.iter().find(|c| c.coordinate.column == column)
    }
}

/// A rectangular merged-cell block, e.g. `A1:B3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedRange {
    /// Upper-left corner (holds the display value)
    pub top_left: CellCoordinate,
    /// Lower-right corner
    pub bottom_right: CellCoordinate,
}

impl MergedRange {
    /// Parse a range reference like `A1:C3`.
    ///
    /// Ranges whose corners are inverted are rejected.
    pub fn from_reference(reference: &str) -> Option<Self> {
        let (start, end) = reference.split_once(':')?;
        let top_left = CellCoordinate::from_reference(start)?;
        let bottom_right = CellCoordinate::from_reference(end)?;

        if top_left.row > bottom_right.row || top_left.column > bottom_right.column {
            return None;
        }

        Some(Self {
            top_left,
            bottom_right,
        })
    }

    /// Render the canonical `A1:C3` form.
    pub fn to_reference(self) -> String {
        format!(
            "{}:{}",
            self.top_left.to_reference(),
            self.bottom_right.to_reference()
        )
    }

    /// Whether the coordinate lies inside this range.
    pub fn contains(self, coordinate: CellCoordinate) -> bool {
        coordinate.row >= self.top_left.row
            && coordinate.row <= self.bottom_right.row
            && coordinate.column >= self.top_left.column
            && coordinate.column <= self.bottom_right.column
    }
}

/// Per-column settings from the worksheet's `cols` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// 1-based column index
    pub column: u32,
    /// Whether the column is marked hidden
    pub hidden: bool,
    /// Declared width, if any
    pub width: Option<f64>,
}

/// Structural worksheet facts gathered while streaming.
///
/// Delivered to the row handler after each structural section completes and
/// once more at end of stream; the latest delivery is authoritative.
#[derive(Debug, Clone, Default)]
pub struct WorksheetMetadata {
    /// Merged ranges from the `mergeCells` section
    pub merged_cells: Vec<MergedRange>,
    /// Column descriptors from the `cols` section
    pub columns: Vec<ColumnInfo>,
}

impl WorksheetMetadata {
    /// Whether the 1-based column is marked hidden.
    pub fn is_column_hidden(&self, column: u32) -> bool {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.hidden)
            .unwrap_or(false)
    }

    /// Find the merged range containing the coordinate, if any.
    pub fn find_merged_range(&self, coordinate: CellCoordinate) -> Option<&MergedRange> {
        self.merged_cells.iter().find(|r| r.contains(coordinate))
    }
}

/// Sheet visibility as declared in the workbook part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

/// One sheet as listed in the workbook part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetInfo {
    /// Display name
    pub name: String,
    /// Numeric sheet id from the workbook part
    pub sheet_id: u32,
    /// Relationship id linking to the worksheet part
    pub rel_id: String,
    /// Relationship target, relative to the workbook part's directory
    pub target: String,
    /// Declared visibility
    pub visibility: SheetVisibility,
}

impl SheetInfo {
    /// Whether the sheet is visible (neither hidden nor very hidden).
    pub fn is_visible(&self) -> bool {
        self.visibility == SheetVisibility::Visible
    }
}

/// Which serial-date epoch the workbook uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateEpoch {
    /// Windows default; carries the phantom 1900-02-29 at serial 60.
    #[default]
    Epoch1900,
    /// Legacy Mac epoch; serials are offset by 1462 days.
    Epoch1904,
}
