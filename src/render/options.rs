//! Conversion options.

use crate::container::ZipLimits;
use crate::shared_strings::SharedStringsConfig;

/// End-of-record sequence for the output text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Newline {
    /// `\n`
    #[default]
    Lf,
    /// `\r\n`
    Crlf,
}

/// How merged ranges affect absent cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergedCells {
    /// Absent cells inside a merged range stay empty.
    #[default]
    None,
    /// Absent cells inside a merged range repeat the top-left value.
    Propagate,
}

/// Options for converting a workbook to delimited text.
///
/// Covers the emitter plus the upstream knobs a conversion session needs:
/// shared-string storage and archive security limits.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Field separator byte
    pub delimiter: u8,
    /// End-of-record sequence
    pub newline: Newline,
    /// Prepend a UTF-8 BOM once at the start of the output
    pub bom: bool,
    /// Emit rows marked hidden
    pub include_hidden_rows: bool,
    /// Emit columns marked hidden
    pub include_hidden_columns: bool,
    /// Merged-cell policy
    pub merged: MergedCells,
    /// Shared-string parsing and storage configuration
    pub shared_strings: SharedStringsConfig,
    /// Archive security limits
    pub limits: ZipLimits,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            newline: Newline::Lf,
            bom: false,
            include_hidden_rows: true,
            include_hidden_columns: true,
            merged: MergedCells::None,
            shared_strings: SharedStringsConfig::default(),
            limits: ZipLimits::default(),
        }
    }
}

impl ConvertOptions {
    /// Create default conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the field separator.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the end-of-record sequence.
    pub fn with_newline(mut self, newline: Newline) -> Self {
        self.newline = newline;
        self
    }

    /// Enable or disable the leading UTF-8 BOM.
    pub fn with_bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }

    /// Include or drop hidden rows.
    pub fn with_hidden_rows(mut self, include: bool) -> Self {
        self.include_hidden_rows = include;
        self
    }

    /// Include or drop hidden columns.
    pub fn with_hidden_columns(mut self, include: bool) -> Self {
        self.include_hidden_columns = include;
        self
    }

    /// Set the merged-cell policy.
    pub fn with_merged(mut self, merged: MergedCells) -> Self {
        self.merged = merged;
        self
    }

    /// Set the shared-string configuration.
    pub fn with_shared_strings(mut self, config: SharedStringsConfig) -> Self {
        self.shared_strings = config;
        self
    }

    /// Set the archive security limits.
    pub fn with_limits(mut self, limits: ZipLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ConvertOptions::default();
        assert_eq!(options.delimiter, b',');
        assert_eq!(options.newline, Newline::Lf);
        assert!(!options.bom);
        assert!(options.include_hidden_rows);
        assert!(options.include_hidden_columns);
        assert_eq!(options.merged, MergedCells::None);
    }

    #[test]
    fn test_builder_pattern() {
        let options = ConvertOptions::new()
            .with_delimiter(b';')
            .with_newline(Newline::Crlf)
            .with_bom(true)
            .with_hidden_rows(false)
            .with_merged(MergedCells::Propagate);

        assert_eq!(options.delimiter, b';');
        assert_eq!(options.newline, Newline::Crlf);
        assert!(options.bom);
        assert!(!options.include_hidden_rows);
        assert_eq!(options.merged, MergedCells::Propagate);
    }
}
