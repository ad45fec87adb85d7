//! Discovery and concatenation of the input workbooks.

use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::error::SheetError;
use crate::error::StageContext;
use crate::progress::ProgressReporter;
use crate::progress::Stage;
use crate::spreadsheet::read_table;
use crate::table::Table;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Rows of every input file plus the file whose layout is reused.
#[derive(Debug)]
pub struct MergedTable {
    pub table: Table,
    /// First file read; its first sheet is the formatting template
    pub template: PathBuf,
}

/// Lists the `.xlsx` files directly inside `directory` in sorted order.
///
/// Office lock files (`~$name.xlsx`) and the tool's own output files are
/// skipped so that a rerun does not merge its previous results.
pub fn discover_inputs(directory: &Path, config: &ReportConfig) -> Result<Vec<PathBuf>, ReportError> {
    let pattern = glob::Pattern::escape(&directory.display().to_string());
    let pattern = Path::new(&pattern).join("*.xlsx");
    let entries = glob::glob(&pattern.to_string_lossy())
        .map_err(SheetError::from)
        .read_context(directory)?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|error| {
            let path = error.path().to_owned();
            ReportError::Read {
                path,
                source: SheetError::IoError(std::io::Error::from(error)),
            }
        })?;
        let file_name = path.file_name().map(|name| name.to_string_lossy()).unwrap_or_default();
        if file_name.starts_with("~$") || config.is_output_name(&file_name) {
            debug!(path = %path.display(), "skipping file");
            continue;
        }
        if path.is_file() {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Reads every path in order and appends its rows to one table.
///
/// Emits a status update before each file and `(i + 1, total)` after it.
///
/// # Errors
///
/// [`ReportError::NoInput`] when `paths` is empty, nothing is read then;
/// [`ReportError::Read`] for the first file that cannot be read.
pub fn merge_tables(directory: &Path, paths: &[PathBuf], reporter: &dyn ProgressReporter) -> Result<MergedTable, ReportError> {
    let (template, _) = paths.split_first().ok_or_else(|| ReportError::NoInput {
        directory: directory.to_owned(),
    })?;

    let total = paths.len();
    let mut merged: Option<Table> = None;
    for (index, path) in paths.iter().enumerate() {
        let name = display_name(path);
        reporter.report(Stage::Merge, index, total, &format!("Reading {name} ({}/{total})", index + 1));
        let table = read_table(path)?;
        debug!(path = %path.display(), rows = table.len(), "read input file");

        match merged.as_mut() {
            None => merged = Some(table),
            // An empty first sheet has no header; take the columns of the first file that has one
            Some(merged) if merged.columns().is_empty() => {
                debug!(path = %path.display(), columns = ?table.columns(), "taking header from a later file");
                *merged = table;
            }
            Some(merged) => {
                if table.columns() != merged.columns() {
                    warn!(
                        path = %path.display(),
                        expected = ?merged.columns(),
                        found = ?table.columns(),
                        "header differs from the first file, rows are aligned by position"
                    );
                }
                merged.append(table);
            }
        }
        reporter.report(Stage::Merge, index + 1, total, &name);
    }

    let table = merged.unwrap_or_default();
    info!(files = total, rows = table.len(), "merged input files");
    Ok(MergedTable {
        table,
        template: template.to_owned(),
    })
}

pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
