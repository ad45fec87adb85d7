use std::fmt::Display;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Low-level failure raised while decoding or encoding a workbook package.
/// Aggregates errors from the standard library, dependencies and internal modules.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("{0}")]
    WithContextError(String),

    // Standard library errors
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("{0}")]
    StringEncodingError(#[from] std::str::Utf8Error),

    #[error("{0}")]
    PatternError(#[from] glob::PatternError),

    // Third-party library errors
    #[error("{0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("{0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("{0}")]
    XmlEncodingError(#[from] quick_xml::encoding::EncodingError),

    #[error("{0}")]
    XmlAttributeError(#[from] quick_xml::events::attributes::AttrError),

    #[error("{0}")]
    PersistError(#[from] tempfile::PersistError),

    // Helper module errors
    #[error("{0}")]
    XmlHelperError(#[from] crate::helpers::xml::XmlError),

    // Spreadsheet module errors
    #[error("{0}")]
    SpreadsheetError(#[from] crate::spreadsheet::SpreadsheetError),
}

/// Why a set of columns was required when it turned out to be missing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColumnPurpose {
    /// Confirmation date / check columns used by the record filter
    Filter,
    /// Output columns of the extraction report
    Projection,
}

impl Display for ColumnPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnPurpose::Filter => write!(f, "filtering"),
            ColumnPurpose::Projection => write!(f, "extraction"),
        }
    }
}

/// Pipeline failure. Every variant is terminal for the run that raised it.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: SheetError,
    },

    #[error("No .xlsx files found in '{}'", directory.display())]
    NoInput { directory: PathBuf },

    #[error("Failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: SheetError,
    },

    #[error("Missing column(s) required for {purpose}: {}", columns.join(", "))]
    ColumnMissing {
        purpose: ColumnPurpose,
        columns: Vec<String>,
    },

    #[error("Background task failed: {0}")]
    Worker(String),
}

impl ReportError {
    /// Short heading used when the error is shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            ReportError::Read { .. } => "Read error",
            ReportError::NoInput { .. } => "No input files",
            ReportError::Write { .. } => "Save failed",
            ReportError::ColumnMissing { .. } => "Missing columns",
            ReportError::Worker(_) => "Internal error",
        }
    }

    /// Process exit code for the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            ReportError::NoInput { .. } => 2,
            ReportError::Read { .. } => 3,
            ReportError::Write { .. } => 4,
            ReportError::ColumnMissing { .. } => 5,
            ReportError::Worker(_) => 1,
        }
    }
}

pub(crate) trait ResultMessage {
    fn with_prefix(self, message: &str) -> Self;
}

impl<T> ResultMessage for Result<T, SheetError> {
    fn with_prefix(self, message: &str) -> Self {
        self.map_err(|e| SheetError::WithContextError(format!("{}: {}", message, e)))
    }
}

/// Lifts helper failures into the pipeline taxonomy at a stage boundary.
pub(crate) trait StageContext<T> {
    fn read_context(self, path: &Path) -> Result<T, ReportError>;

    fn write_context(self, path: &Path) -> Result<T, ReportError>;
}

impl<T> StageContext<T> for Result<T, SheetError> {
    fn read_context(self, path: &Path) -> Result<T, ReportError> {
        self.map_err(|source| ReportError::Read {
            path: path.to_owned(),
            source,
        })
    }

    fn write_context(self, path: &Path) -> Result<T, ReportError> {
        self.map_err(|source| ReportError::Write {
            path: path.to_owned(),
            source,
        })
    }
}
