//! # PPT Report Merge and Extraction
//!
//! Merges a folder of weekly PPT report workbooks into one formatted workbook,
//! then draws a random inspection sample of recent, not yet checked records.
//!
//! ## Features
//!
//! - **Template-preserving merge**: rows of every `.xlsx` file in a folder are
//!   written into a copy of the first file, keeping its column widths, header
//!   styles, views and page setup
//! - **Record filter**: keeps rows confirmed during the last seven days whose
//!   first-inspection column is still empty
//! - **Random sample**: each eligible row is kept with probability 0.2,
//!   reproducible with a seed
//! - **Report output**: the sample's report columns are saved as a new workbook
//! - **Pure Rust implementation**: workbooks are read and written directly as
//!   ZIP/XML packages
//!
//! ## Pipeline
//!
//! - [`pipeline::merge_directory`]: folder → `PPT_Report_Combine.xlsx`
//! - [`pipeline::filter_and_extract`]: merged workbook → `PE_ICL抽取结果.xlsx`
//!
//! Both stages report progress through [`progress::ProgressReporter`] and
//! fail with a [`error::ReportError`].

pub mod cli;
pub mod config;
pub mod error;
mod helpers;
pub mod pipeline;
pub mod progress;
pub mod spreadsheet;
pub mod table;
pub mod ui;
pub mod writer;

#[cfg(test)]
mod test_utils;

pub use config::ReportConfig;
pub use error::ReportError;
pub use pipeline::ExtractOutcome;
pub use pipeline::MergeOutcome;
pub use pipeline::RunState;
pub use table::Table;
pub use table::Value;
