//! # unxlsx
//!
//! Streaming XLSX workbook extraction to delimited text.
//!
//! This library opens an OOXML spreadsheet package, resolves its parts
//! through the relationship graph, and converts worksheets to CSV-style
//! text in a single streaming pass per sheet. Untrusted archives are read
//! behind configurable size limits, and oversized shared-string pools spill
//! to a temp file instead of exhausting memory.
//!
//! ## Quick Start
//!
//! ```no_run
//! use unxlsx::{sheet_to_text, ConvertOptions};
//!
//! // First sheet, default options
//! let csv = sheet_to_text("report.xlsx", -1, &ConvertOptions::default())?;
//! println!("{}", csv);
//!
//! // A named sheet with a semicolon delimiter
//! let options = ConvertOptions::new().with_delimiter(b';');
//! let csv = sheet_to_text("report.xlsx", "Q3 Totals", &options)?;
//! # Ok::<(), unxlsx::Error>(())
//! ```
//!
//! ## Session reuse
//!
//! ```no_run
//! use unxlsx::WorkbookReader;
//!
//! let reader = WorkbookReader::open("report.xlsx")?;
//! for name in reader.sheet_names() {
//!     println!("sheet: {}", name);
//! }
//! let all = reader.to_text_all()?;
//! # Ok::<(), unxlsx::Error>(())
//! ```

pub mod container;
pub mod error;
pub mod model;
pub mod package;
pub mod render;
pub mod shared_strings;
pub mod sheet;
pub mod styles;
pub mod workbook;

// Re-exports
pub use container::{ZipEntry, ZipLimits, ZipReader};
pub use error::{Error, Result};
pub use model::{
    CellCoordinate, CellData, CellValue, ColumnInfo, DateEpoch, MergedRange, RowData, SheetInfo,
    SheetVisibility, WorksheetMetadata,
};
pub use package::{OpcPackage, Relationship, Relationships};
pub use render::{ConvertOptions, DelimitedCollector, MergedCells, Newline};
pub use shared_strings::{SharedStrings, SharedStringsConfig, SharedStringsMode};
pub use sheet::{RowHandler, SheetReader};
pub use styles::{FormatKind, NumberFormat, StylesRegistry};
pub use workbook::Workbook;

use std::collections::BTreeMap;
use std::path::Path;

/// Conventional part locations, used when the workbook's relationship set
/// does not name them.
const DEFAULT_STYLES_PART: &str = "xl/styles.xml";
const DEFAULT_SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";

/// Selects which sheet to convert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    /// By display name
    Name(String),
    /// By zero-based position; `-1` selects the first sheet
    Index(i32),
}

impl From<&str> for SheetSelector {
    fn from(name: &str) -> Self {
        SheetSelector::Name(name.to_string())
    }
}

impl From<String> for SheetSelector {
    fn from(name: String) -> Self {
        SheetSelector::Name(name)
    }
}

impl From<i32> for SheetSelector {
    fn from(index: i32) -> Self {
        SheetSelector::Index(index)
    }
}

/// An opened workbook conversion session.
///
/// Opening parses the package structure, workbook part, styles, and shared
/// strings once; any number of sheets can then be converted against them.
/// Failures in the optional parts (styles, shared strings) degrade to
/// defaults: styles fall back to General and shared-string references
/// resolve to empty fields.
pub struct WorkbookReader {
    package: OpcPackage,
    workbook: Workbook,
    styles: StylesRegistry,
    shared_strings: SharedStrings,
    options: ConvertOptions,
}

impl WorkbookReader {
    /// Open a workbook file with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_options(path, ConvertOptions::default())
    }

    /// Open a workbook file.
    pub fn open_with_options(path: impl AsRef<Path>, options: ConvertOptions) -> Result<Self> {
        let package = OpcPackage::open_with_limits(path, options.limits.clone())?;
        Self::from_package(package, options)
    }

    /// Open a workbook held in memory with default options.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_options(data, ConvertOptions::default())
    }

    /// Open a workbook held in memory.
    pub fn from_bytes_with_options(data: Vec<u8>, options: ConvertOptions) -> Result<Self> {
        let package = OpcPackage::from_bytes_with_limits(data, options.limits.clone())?;
        Self::from_package(package, options)
    }

    fn from_package(package: OpcPackage, options: ConvertOptions) -> Result<Self> {
        let workbook = Workbook::parse(&package)?;

        let styles_path = workbook
            .styles_path()
            .unwrap_or_else(|| DEFAULT_STYLES_PART.to_string());
        let styles = StylesRegistry::parse(&package, &styles_path).unwrap_or_default();

        let shared_strings_path = workbook
            .shared_strings_path()
            .unwrap_or_else(|| DEFAULT_SHARED_STRINGS_PART.to_string());
        let shared_strings =
            SharedStrings::parse(&package, &shared_strings_path, &options.shared_strings)
                .unwrap_or_default();

        Ok(Self {
            package,
            workbook,
            styles,
            shared_strings,
            options,
        })
    }

    /// All sheets in workbook order.
    pub fn sheets(&self) -> &[SheetInfo] {
        self.workbook.sheets()
    }

    /// Sheet display names in workbook order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.workbook.sheets().iter().map(|s| s.name.as_str()).collect()
    }

    /// Sheets that are neither hidden nor very hidden.
    pub fn visible_sheets(&self) -> Vec<&SheetInfo> {
        self.workbook.visible_sheets().collect()
    }

    /// The workbook's serial-date epoch.
    pub fn date_epoch(&self) -> DateEpoch {
        self.workbook.date_epoch()
    }

    /// The options this session was opened with.
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert one sheet to delimited text.
    pub fn to_text(&self, selector: impl Into<SheetSelector>) -> Result<String> {
        let sheet = self.select(selector.into())?;
        self.convert_sheet(sheet)
    }

    /// Convert every visible sheet, keyed by sheet name.
    pub fn to_text_all(&self) -> Result<BTreeMap<String, String>> {
        let mut results = BTreeMap::new();
        for sheet in self.workbook.visible_sheets() {
            results.insert(sheet.name.clone(), self.convert_sheet(sheet)?);
        }
        Ok(results)
    }

    /// Convert the named sheets, keyed by sheet name.
    pub fn to_text_many(&self, names: &[&str]) -> Result<BTreeMap<String, String>> {
        let mut results = BTreeMap::new();
        for name in names {
            let sheet = self
                .workbook
                .find_by_name(name)
                .ok_or_else(|| Error::SheetNotFound(name.to_string()))?;
            results.insert(sheet.name.clone(), self.convert_sheet(sheet)?);
        }
        Ok(results)
    }

    fn select(&self, selector: SheetSelector) -> Result<&SheetInfo> {
        match selector {
            SheetSelector::Name(name) => self
                .workbook
                .find_by_name(&name)
                .ok_or(Error::SheetNotFound(name)),
            SheetSelector::Index(-1) => self
                .workbook
                .find_by_index(0)
                .ok_or_else(|| Error::SheetNotFound("index -1".to_string())),
            SheetSelector::Index(index) => usize::try_from(index)
                .ok()
                .and_then(|i| self.workbook.find_by_index(i))
                .ok_or_else(|| Error::SheetNotFound(format!("index {}", index))),
        }
    }

    fn convert_sheet(&self, sheet: &SheetInfo) -> Result<String> {
        let path = self.workbook.sheet_path(sheet);
        let mut collector = DelimitedCollector::new(
            &self.shared_strings,
            &self.styles,
            self.workbook.date_epoch(),
            &self.options,
        );
        SheetReader::read_sheet(&self.package, &path, &mut collector)?;
        Ok(collector.finish())
    }
}

impl std::fmt::Debug for WorkbookReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkbookReader")
            .field("sheets", &self.workbook.sheet_count())
            .field("date_epoch", &self.workbook.date_epoch())
            .field("shared_strings", &self.shared_strings.count())
            .finish()
    }
}

/// Convert one sheet of a workbook file to delimited text.
///
/// # Example
///
/// ```no_run
/// use unxlsx::{sheet_to_text, ConvertOptions};
///
/// let csv = sheet_to_text("data.xlsx", 0, &ConvertOptions::default())?;
/// # Ok::<(), unxlsx::Error>(())
/// ```
pub fn sheet_to_text(
    path: impl AsRef<Path>,
    selector: impl Into<SheetSelector>,
    options: &ConvertOptions,
) -> Result<String> {
    WorkbookReader::open_with_options(path, options.clone())?.to_text(selector)
}

/// Convert every visible sheet of a workbook file, keyed by sheet name.
pub fn workbook_to_text(
    path: impl AsRef<Path>,
    options: &ConvertOptions,
) -> Result<BTreeMap<String, String>> {
    WorkbookReader::open_with_options(path, options.clone())?.to_text_all()
}

/// List the sheets of a workbook file without converting anything.
pub fn sheet_list(path: impl AsRef<Path>) -> Result<Vec<SheetInfo>> {
    Ok(WorkbookReader::open(path)?.sheets().to_vec())
}

/// List the sheet names of a workbook file.
pub fn sheet_names(path: impl AsRef<Path>) -> Result<Vec<String>> {
    Ok(WorkbookReader::open(path)?
        .sheet_names()
        .into_iter()
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_conversions() {
        assert_eq!(
            SheetSelector::from("Data"),
            SheetSelector::Name("Data".to_string())
        );
        assert_eq!(SheetSelector::from(-1), SheetSelector::Index(-1));
        assert_eq!(SheetSelector::from(2), SheetSelector::Index(2));
    }

    #[test]
    fn test_open_missing_file() {
        let result = WorkbookReader::open("does-not-exist.xlsx");
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_open_garbage_bytes() {
        let result = WorkbookReader::from_bytes(vec![1, 2, 3, 4, 5]);
        assert!(matches!(result, Err(Error::NotAZip(_))));
    }
}
