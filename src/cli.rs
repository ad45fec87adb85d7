use crate::config::ReportConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ppt-report")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Merge a folder of PPT report workbooks and extract a PE/ICL inspection sample")]
#[command(
    long_about = "Merges every .xlsx file of a folder into PPT_Report_Combine.xlsx, keeping the \
                  formatting of the first file, then optionally selects the records confirmed \
                  during the last 7 days that have no first inspection yet, samples 20% of them \
                  and saves the report columns to PE_ICL抽取结果.xlsx."
)]
#[command(after_help = "EXAMPLES:\n  \
    ppt-report ./weekly-reports\n  \
    ppt-report ./weekly-reports --yes --seed 42\n  \
    ppt-report ./weekly-reports --no-extract -v")]
pub struct Cli {
    /// Folder containing the .xlsx files to merge (prompted for when omitted)
    pub folder: Option<PathBuf>,

    /// Run filter and extraction after the merge without asking
    #[arg(short, long, conflicts_with = "no_extract")]
    pub yes: bool,

    /// Stop after the merge without asking
    #[arg(long)]
    pub no_extract: bool,

    /// Seed for a reproducible sample
    #[arg(long)]
    pub seed: Option<u64>,

    /// Verbose output level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (no progress bars, errors only)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// What to do once the merge has finished.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Extract,
    Skip,
    Ask,
}

impl Cli {
    pub fn config(&self) -> ReportConfig {
        ReportConfig {
            seed: self.seed,
            ..ReportConfig::default()
        }
    }

    pub fn confirmation(&self) -> Confirmation {
        if self.yes {
            Confirmation::Extract
        } else if self.no_extract {
            Confirmation::Skip
        } else {
            Confirmation::Ask
        }
    }

    /// Default `tracing` filter, used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            _ => "debug",
        }
    }
}
