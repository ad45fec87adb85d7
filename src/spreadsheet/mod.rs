//! # Spreadsheet Reading
//!
//! Reads the first worksheet of an Excel 2007+ (`.xlsx`) workbook into a
//! row-oriented [`Table`]. The package is parsed directly from its ZIP/XML
//! parts: shared strings, inline strings, booleans, numbers and date-formatted
//! serials are decoded into typed [`Value`](crate::table::Value)s, with row 1
//! of the sheet used as the column header.

pub(crate) mod cell;
pub(crate) mod excel;
pub(crate) mod reference;
pub(crate) mod xlsx;

use crate::error::ReportError;
use crate::error::StageContext;
use crate::table::Table;
use std::path::Path;
use thiserror::Error;

/// Errors raised while interpreting workbook contents.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Missing package part '{0}'")]
    FileError(String),

    #[error("Workbook '{0}' is encrypted or not an Office Open XML file")]
    CompoundFileError(String),

    #[error("Workbook '{0}' contains no worksheet")]
    SpreadsheetEmptyError(String),

    #[error("Invalid cell value in '{0}' sheet '{1}' at {2}: '{3}'")]
    CellValueError(String, String, String, String),
}

/// Reads the first sheet of `path`, treating its first row as column headers.
///
/// # Errors
///
/// Returns [`ReportError::Read`] when the file cannot be opened, is not a
/// valid `.xlsx` package, has no worksheet, or contains malformed XML.
pub fn read_table(path: &Path) -> Result<Table, ReportError> {
    xlsx::read_first_sheet(path).read_context(path)
}
