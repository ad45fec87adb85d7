//! Column projection of the extraction report.

use crate::error::ColumnPurpose;
use crate::error::ReportError;
use crate::table::Table;

/// Builds a table holding exactly `columns`, in that order.
///
/// # Errors
///
/// [`ReportError::ColumnMissing`] listing every requested column `table` lacks.
pub fn project<S: AsRef<str>>(table: &Table, columns: &[S]) -> Result<Table, ReportError> {
    let missing = table.missing_columns(columns);
    if !missing.is_empty() {
        return Err(ReportError::ColumnMissing {
            purpose: ColumnPurpose::Projection,
            columns: missing,
        });
    }

    let indexes: Vec<usize> = columns
        .iter()
        .filter_map(|name| table.column_index(name.as_ref()))
        .collect();
    let mut projected = Table::new(columns.iter().map(|name| name.as_ref().to_owned()).collect());
    for row in table.rows() {
        projected.push_row(indexes.iter().map(|index| row[*index].clone()).collect());
    }
    Ok(projected)
}
