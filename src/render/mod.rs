//! Delimited-text rendering of streamed worksheet rows.

mod delimited;
mod options;
mod value;

pub use delimited::DelimitedCollector;
pub use options::{ConvertOptions, MergedCells, Newline};
