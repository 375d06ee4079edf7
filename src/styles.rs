//! Styles part parsing and number-format classification.
//!
//! The registry's job for text output is small but load-bearing: decide,
//! per cell style, whether a numeric cell holds a date serial. Format codes
//! are classified with a coarse token scan; full format rendering is out of
//! scope.

use crate::error::{Error, Result};
use crate::package::OpcPackage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse classification of a number-format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    General,
    Integer,
    Decimal,
    Percentage,
    Currency,
    Scientific,
    Fraction,
    Date,
    Time,
    DateTime,
    Text,
    Custom,
}

impl FormatKind {
    /// Whether a numeric cell with this format renders as a calendar value.
    pub fn is_date_time(self) -> bool {
        matches!(self, FormatKind::Date | FormatKind::Time | FormatKind::DateTime)
    }
}

/// One number format: id, code, and its classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberFormat {
    /// Numeric format id
    pub id: u32,
    /// The format code string
    pub code: String,
    /// Coarse classification of the code
    pub kind: FormatKind,
    /// Whether this is one of the OOXML built-ins
    pub built_in: bool,
}

/// One `cellXfs/xf` entry. Font, fill, and border ids are informational.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellStyle {
    pub num_fmt_id: u32,
    pub font_id: u32,
    pub fill_id: u32,
    pub border_id: u32,
    /// Precomputed from the referenced number format
    pub is_date_time: bool,
}

/// The parsed styles part.
///
/// Read-only after parsing; the emitter borrows it for the duration of a
/// sheet session.
#[derive(Debug)]
pub struct StylesRegistry {
    formats: HashMap<u32, NumberFormat>,
    styles: Vec<CellStyle>,
}

impl Default for StylesRegistry {
    /// A registry with only the OOXML built-in formats and no cell styles,
    /// used when the workbook has no styles part.
    fn default() -> Self {
        Self {
            formats: built_in_formats(),
            styles: Vec::new(),
        }
    }
}

impl StylesRegistry {
    /// Parse the styles part at the given package path.
    pub fn parse(package: &OpcPackage, path: &str) -> Result<Self> {
        if !package.zip().has(path)? {
            return Err(Error::EntryNotFound(path.to_string()));
        }
        let xml = package.read_part(path)?;
        Self::parse_xml(&xml, path)
    }

    /// Parse styles XML content.
    pub fn parse_xml(xml: &str, part: &str) -> Result<Self> {
        let mut registry = Self::default();

        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut in_num_fmts = false;
        let mut in_cell_xfs = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Start(ref e)) => match e.name().as_ref() {
                    b"numFmts" => in_num_fmts = true,
                    b"cellXfs" => in_cell_xfs = true,
                    b"numFmt" if in_num_fmts => registry.add_custom_format(e),
                    b"xf" if in_cell_xfs => registry.add_cell_style(e),
                    _ => {}
                },
                Ok(quick_xml::events::Event::Empty(ref e)) => match e.name().as_ref() {
                    b"numFmt" if in_num_fmts => registry.add_custom_format(e),
                    b"xf" if in_cell_xfs => registry.add_cell_style(e),
                    _ => {}
                },
                Ok(quick_xml::events::Event::End(ref e)) => match e.name().as_ref() {
                    b"numFmts" => in_num_fmts = false,
                    b"cellXfs" => in_cell_xfs = false,
                    _ => {}
                },
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => {
                    return Err(Error::InvalidXml {
                        part: part.to_string(),
                        detail: e.to_string(),
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(registry)
    }

    fn add_custom_format(&mut self, e: &quick_xml::events::BytesStart<'_>) {
        let mut id: Option<u32> = None;
        let mut code = String::new();

        for attr in e.attributes().flatten() {
            match attr.key.as_ref() {
                b"numFmtId" => {
                    id = String::from_utf8_lossy(&attr.value).parse().ok();
                }
                b"formatCode" => {
                    code = String::from_utf8_lossy(&attr.value).to_string();
                }
                _ => {}
            }
        }

        if let Some(id) = id {
            let kind = Self::classify(&code);
            self.formats.insert(
                id,
                NumberFormat {
                    id,
                    code,
                    kind,
                    built_in: false,
                },
            );
        }
    }

    fn add_cell_style(&mut self, e: &quick_xml::events::BytesStart<'_>) {
        let mut style = CellStyle::default();

        for attr in e.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value);
            match attr.key.as_ref() {
                b"numFmtId" => style.num_fmt_id = value.parse().unwrap_or(0),
                b"fontId" => style.font_id = value.parse().unwrap_or(0),
                b"fillId" => style.fill_id = value.parse().unwrap_or(0),
                b"borderId" => style.border_id = value.parse().unwrap_or(0),
                _ => {}
            }
        }

        style.is_date_time = self
            .formats
            .get(&style.num_fmt_id)
            .map(|f| f.kind.is_date_time())
            .unwrap_or(false);
        self.styles.push(style);
    }

    /// The style entry at a 0-based `cellXfs` index.
    pub fn cell_style(&self, index: u32) -> Option<&CellStyle> {
        self.styles.get(index as usize)
    }

    /// The number format registered under an id, built-in or custom.
    pub fn number_format(&self, id: u32) -> Option<&NumberFormat> {
        self.formats.get(&id)
    }

    /// Whether the style at the given index renders numbers as calendar
    /// values. Unknown indices resolve to false.
    pub fn is_date_time_style(&self, index: u32) -> bool {
        self.styles
            .get(index as usize)
            .map(|s| s.is_date_time)
            .unwrap_or(false)
    }

    /// Whether a format id classifies as date, time, or date-time.
    pub fn is_date_time_format(&self, id: u32) -> bool {
        self.formats
            .get(&id)
            .map(|f| f.kind.is_date_time())
            .unwrap_or(false)
    }

    /// Number of parsed cell styles.
    pub fn style_count(&self) -> usize {
        self.styles.len()
    }

    /// Number of registered formats, built-ins included.
    pub fn format_count(&self) -> usize {
        self.formats.len()
    }

    /// Classify a format code.
    ///
    /// Date/time tokens are scanned ahead of the literal `%`/currency/`@`
    /// scans so that locale-bracketed codes like `[$-409]d/m/yyyy;@`
    /// classify as dates.
    pub fn classify(code: &str) -> FormatKind {
        if code.is_empty() || code == "General" {
            return FormatKind::General;
        }

        let date = has_date_token(code);
        let time = has_time_token(code);
        match (date, time) {
            (true, true) => return FormatKind::DateTime,
            (true, false) => return FormatKind::Date,
            (false, true) => return FormatKind::Time,
            (false, false) => {}
        }

        if code.contains('%') {
            return FormatKind::Percentage;
        }
        if code.contains('$') || code.contains('\u{00A4}') || code.contains("[Currency]") {
            return FormatKind::Currency;
        }
        if has_scientific_token(code) {
            return FormatKind::Scientific;
        }
        if code.contains('/') {
            return FormatKind::Fraction;
        }
        if code.contains('@') {
            return FormatKind::Text;
        }
        if code.contains('.') {
            return FormatKind::Decimal;
        }
        if code.contains('0') || code.contains('#') {
            return FormatKind::Integer;
        }

        FormatKind::Custom
    }
}

/// Year (`y`/`Y`), day (`d`), or a month `M` outside the literal `AM/PM`.
fn has_date_token(code: &str) -> bool {
    if code.contains('y') || code.contains('Y') || code.contains('d') {
        return true;
    }
    code.replace("AM/PM", "").contains('M')
}

/// Hour or second tokens; minutes only ever appear alongside them, so they
/// carry no extra signal here.
fn has_time_token(code: &str) -> bool {
    code.contains('h') || code.contains('H') || code.contains('s') || code.contains('S')
}

/// An `e`/`E` immediately followed by an explicit sign.
fn has_scientific_token(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.windows(2).any(|pair| {
        (pair[0] == b'e' || pair[0] == b'E') && (pair[1] == b'+' || pair[1] == b'-')
    })
}

/// The OOXML built-in number formats this registry seeds itself with.
fn built_in_formats() -> HashMap<u32, NumberFormat> {
    const BUILT_INS: &[(u32, &str, FormatKind)] = &[
        (0, "General", FormatKind::General),
        (1, "0", FormatKind::Integer),
        (2, "0.00", FormatKind::Decimal),
        (3, "#,##0", FormatKind::Integer),
        (4, "#,##0.00", FormatKind::Decimal),
        (9, "0%", FormatKind::Percentage),
        (10, "0.00%", FormatKind::Percentage),
        (11, "0.00E+00", FormatKind::Scientific),
        (12, "# ?/?", FormatKind::Fraction),
        (13, "# ??/??", FormatKind::Fraction),
        (14, "mm-dd-yy", FormatKind::Date),
        (15, "d-mmm-yy", FormatKind::Date),
        (16, "d-mmm", FormatKind::Date),
        (17, "mmm-yy", FormatKind::Date),
        (18, "h:mm AM/PM", FormatKind::Time),
        (19, "h:mm:ss AM/PM", FormatKind::Time),
        (20, "h:mm", FormatKind::Time),
        (21, "h:mm:ss", FormatKind::Time),
        (22, "m/d/yy h:mm", FormatKind::DateTime),
        (37, "#,##0 ;(#,##0)", FormatKind::Currency),
        (38, "#,##0 ;[Red](#,##0)", FormatKind::Currency),
        (39, "#,##0.00;(#,##0.00)", FormatKind::Currency),
        (40, "#,##0.00;[Red](#,##0.00)", FormatKind::Currency),
        (49, "@", FormatKind::Text),
    ];

    BUILT_INS
        .iter()
        .map(|&(id, code, kind)| {
            (
                id,
                NumberFormat {
                    id,
                    code: code.to_string(),
                    kind,
                    built_in: true,
                },
            )
        })
        .collect()
}
