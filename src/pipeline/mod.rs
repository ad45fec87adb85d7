//! # Report Pipeline
//!
//! Two stages, each run to completion or to the first failure:
//!
//! 1. [`merge_directory`] reads every `.xlsx` file of a folder, concatenates
//!    their rows and writes them into a copy of the first file.
//! 2. [`filter_and_extract`] reads the merged workbook back, keeps recent
//!    records that were not inspected yet, samples them and saves the
//!    report columns as a new workbook.
//!
//! Stages report progress through a [`ProgressReporter`] and can be moved
//! off the calling thread with [`Task`].

mod filter;
mod merge;
mod project;
mod sample;
mod task;

pub use filter::filter_recent_unchecked;
pub use filter::DateWindow;
pub use merge::discover_inputs;
pub use merge::merge_tables;
pub use merge::MergedTable;
pub use project::project;
pub use sample::Sampler;
pub use task::Task;

use crate::config::ReportConfig;
use crate::error::ColumnPurpose;
use crate::error::ReportError;
use crate::progress::ProgressEvent;
use crate::progress::ProgressReporter;
use crate::progress::Stage;
use crate::spreadsheet::read_table;
use crate::table::Table;
use crate::writer::write_with_template;
use crate::writer::write_workbook;
use chrono::NaiveDate;
use std::path::Path;
use std::path::PathBuf;
use tracing::info;

/// Number of steps reported during extraction: read, filter, sample, save
pub const EXTRACT_STEPS: usize = 4;

/// Where a run currently stands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Merging,
    MergeFailed,
    Merged,
    AwaitingConfirmation,
    Skipped,
    Filtering,
    FilterFailed,
    Filtered,
    EmptyResult,
    Sampling,
    Projecting,
    ProjectFailed,
    Done,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::MergeFailed
                | RunState::Skipped
                | RunState::EmptyResult
                | RunState::FilterFailed
                | RunState::ProjectFailed
                | RunState::Done
        )
    }

    /// States entered once the extraction stage has reported `event`, in order.
    pub fn entered_on(event: &ProgressEvent) -> &'static [RunState] {
        match (event.stage, event.current) {
            (Stage::Extract, 2) => &[RunState::Filtered],
            (Stage::Extract, 3) => &[RunState::Sampling, RunState::Projecting],
            _ => &[],
        }
    }

    /// Terminal state reached when the extraction stage fails with `error`.
    pub fn after_extract_error(error: &ReportError) -> RunState {
        match error {
            ReportError::Read { .. } => RunState::FilterFailed,
            ReportError::ColumnMissing {
                purpose: ColumnPurpose::Filter,
                ..
            } => RunState::FilterFailed,
            _ => RunState::ProjectFailed,
        }
    }
}

/// Result of a successful merge.
#[derive(Debug)]
pub struct MergeOutcome {
    /// Merged rows, as written
    pub table: Table,
    /// File whose formatting was reused
    pub template: PathBuf,
    /// Path of the merged workbook
    pub output: PathBuf,
    /// Number of input files read
    pub files: usize,
}

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractOutcome {
    /// No record matched the filter; nothing was written
    Empty,
    Written {
        path: PathBuf,
        /// Rows that passed the filter
        matched: usize,
        /// Rows kept by the sampler and saved
        sampled: usize,
    },
}

/// Merges every input workbook of `directory` into `<directory>/<merged_file_name>`.
///
/// # Errors
///
/// [`ReportError::NoInput`] when the folder has no input file (nothing is
/// written then), [`ReportError::Read`] for the first unreadable file and
/// [`ReportError::Write`] when the merged workbook cannot be saved.
pub fn merge_directory(directory: &Path, config: &ReportConfig, reporter: &dyn ProgressReporter) -> Result<MergeOutcome, ReportError> {
    info!(directory = %directory.display(), "merging workbooks");
    let paths = discover_inputs(directory, config)?;
    let MergedTable { table, template } = merge_tables(directory, &paths, reporter)?;

    let output = config.merged_path(directory);
    reporter.report(Stage::Write, 0, table.len(), "Merge finished, saving formatted workbook");
    write_with_template(&template, &table, &output, config.write_progress_interval, reporter)?;
    info!(path = %output.display(), rows = table.len(), files = paths.len(), "saved merged workbook");

    Ok(MergeOutcome {
        table,
        template,
        output,
        files: paths.len(),
    })
}

/// Filters, samples and projects the merged workbook at `merged`, relative to today.
pub fn filter_and_extract(merged: &Path, config: &ReportConfig, reporter: &dyn ProgressReporter) -> Result<ExtractOutcome, ReportError> {
    extract_in_window(merged, DateWindow::ending_today(config.window_days), config, reporter)
}

/// [`filter_and_extract`] with an explicit current day.
///
/// # Errors
///
/// [`ReportError::Read`] when the merged workbook cannot be read,
/// [`ReportError::ColumnMissing`] when a filter or report column is absent
/// and [`ReportError::Write`] when the report cannot be saved.
pub fn filter_and_extract_on(
    merged: &Path,
    today: NaiveDate,
    config: &ReportConfig,
    reporter: &dyn ProgressReporter,
) -> Result<ExtractOutcome, ReportError> {
    extract_in_window(merged, DateWindow::trailing(today, config.window_days), config, reporter)
}

fn extract_in_window(
    merged: &Path,
    window: DateWindow,
    config: &ReportConfig,
    reporter: &dyn ProgressReporter,
) -> Result<ExtractOutcome, ReportError> {
    reporter.report(Stage::Extract, 0, EXTRACT_STEPS, "Reading merged workbook");
    let table = read_table(merged)?;
    reporter.report(Stage::Extract, 1, EXTRACT_STEPS, "Read finished, filtering records");

    let filtered = filter_recent_unchecked(&table, &config.date_column, &config.check_column, window)?;
    let matched = filtered.len();
    info!(rows = table.len(), matched, from = %window.start(), until = %window.end(), "filtered records");
    reporter.report(Stage::Extract, 2, EXTRACT_STEPS, &format!("Filter finished: {matched} record(s) found"));
    if filtered.is_empty() {
        return Ok(ExtractOutcome::Empty);
    }

    let mut sampler = Sampler::new(config.sample_fraction, config.seed);
    let sample = sampler.sample(&filtered);
    let sampled = sample.len();
    info!(matched, sampled, fraction = sampler.fraction(), "sampled records");
    reporter.report(Stage::Extract, 3, EXTRACT_STEPS, &format!("Sampled {sampled} record(s), saving report"));
    let result = project(&sample, &config.extract_columns)?;

    let path = config.extract_path(merged);
    write_workbook(&path, &result)?;
    reporter.report(Stage::Extract, 4, EXTRACT_STEPS, "Filter and extraction finished");
    info!(path = %path.display(), rows = sampled, "saved extraction");

    Ok(ExtractOutcome::Written { path, matched, sampled })
}
