//! # Workbook Writing
//!
//! Two writers share one cell encoder: [`write_with_template`] streams a
//! table into a copy of an existing workbook so its formatting survives,
//! [`write_workbook`] builds a small standalone workbook from scratch.
//! Both write into a temporary file next to the destination and rename it
//! into place, so a failed write never leaves a truncated output behind.

pub(crate) mod cells;
pub(crate) mod template;
pub(crate) mod workbook;

use crate::error::ReportError;
use crate::error::SheetError;
use crate::error::StageContext;
use crate::progress::ProgressReporter;
use crate::table::Table;
use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes `table` to `output`, reusing the first sheet of `template` as the layout.
///
/// # Errors
///
/// Returns [`ReportError::Write`] when the template cannot be read or the
/// output cannot be written; an existing `output` is left untouched then.
pub fn write_with_template(
    template: &Path,
    table: &Table,
    output: &Path,
    interval: usize,
    reporter: &dyn ProgressReporter,
) -> Result<(), ReportError> {
    template::write_with_template(template, table, output, interval, reporter).write_context(output)
}

/// Writes `table` as the only sheet of a new workbook at `output`.
///
/// # Errors
///
/// Returns [`ReportError::Write`] when the output cannot be written.
pub fn write_workbook(output: &Path, table: &Table) -> Result<(), ReportError> {
    workbook::write_workbook(output, table).write_context(output)
}

/// Runs `write` against a temporary file in the destination folder and
/// renames it over `output` once everything has been flushed.
pub(crate) fn persist_atomically<F>(output: &Path, write: F) -> Result<(), SheetError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), SheetError>,
{
    let directory = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temporary = NamedTempFile::new_in(directory)?;
    {
        let mut buffer = BufWriter::new(temporary.as_file_mut());
        write(&mut buffer)?;
        buffer.flush()?;
    }
    temporary.as_file().sync_all()?;
    temporary.persist(output)?;
    debug!(path = %output.display(), "persisted workbook");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persist_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.bin");
        std::fs::write(&output, b"old").unwrap();

        persist_atomically(&output, |file| {
            file.write_all(b"new")?;
            Ok(())
        })
        .unwrap();

        assert_eq!(std::fs::read(&output).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.bin");
        std::fs::write(&output, b"old").unwrap();

        let result = persist_atomically(&output, |file| {
            file.write_all(b"partial")?;
            Err(SheetError::WithContextError("interrupted".to_owned()))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read(&output).unwrap(), b"old");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
