//! Fixed parameters of a report run.

use std::path::Path;
use std::path::PathBuf;

/// File names, column names and sampling parameters used by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    /// Name of the merged workbook written into the input folder
    pub merged_file_name: String,
    /// Name of the extraction workbook written next to the merged one
    pub extract_file_name: String,
    /// Confirmation date column checked against the trailing window
    pub date_column: String,
    /// Column that must be empty for a row to be eligible
    pub check_column: String,
    /// Output columns of the extraction, in order
    pub extract_columns: Vec<String>,
    /// Length of the trailing window in days, today excluded
    pub window_days: u32,
    /// Probability that an eligible row is kept
    pub sample_fraction: f64,
    /// Rows between two write progress updates
    pub write_progress_interval: usize,
    /// Seed for reproducible sampling, entropy when `None`
    pub seed: Option<u64>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            merged_file_name: "PPT_Report_Combine.xlsx".to_string(),
            extract_file_name: "PE_ICL抽取结果.xlsx".to_string(),
            date_column: "3000:二次确认(AD)".to_string(),
            check_column: "7600:SAIS首检(AD)".to_string(),
            extract_columns: vec![
                "销售凭证".to_string(),
                "安装区域名称".to_string(),
                "安装分公司名称".to_string(),
                "Eq.PE".to_string(),
                "Eq.PE - 名称".to_string(),
            ],
            window_days: 7,
            sample_fraction: 0.2,
            write_progress_interval: 500,
            seed: None,
        }
    }
}

impl ReportConfig {
    pub fn merged_path(&self, directory: &Path) -> PathBuf {
        directory.join(&self.merged_file_name)
    }

    /// Extraction output lives in the folder of the merged workbook.
    pub fn extract_path(&self, merged: &Path) -> PathBuf {
        match merged.parent() {
            Some(parent) => parent.join(&self.extract_file_name),
            None => PathBuf::from(&self.extract_file_name),
        }
    }

    /// True for file names the tool itself produces.
    pub fn is_output_name(&self, file_name: &str) -> bool {
        file_name.eq_ignore_ascii_case(&self.merged_file_name) || file_name == self.extract_file_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths() {
        let config = ReportConfig::default();
        let merged = config.merged_path(Path::new("/data/reports"));
        assert_eq!(merged, PathBuf::from("/data/reports/PPT_Report_Combine.xlsx"));
        assert_eq!(config.extract_path(&merged), PathBuf::from("/data/reports/PE_ICL抽取结果.xlsx"));
        assert!(config.is_output_name("ppt_report_combine.xlsx"));
        assert!(config.is_output_name("PE_ICL抽取结果.xlsx"));
        assert!(!config.is_output_name("week42.xlsx"));
    }
}
