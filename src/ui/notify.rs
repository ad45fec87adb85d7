use crate::error::ReportError;
use anyhow::Context;
use anyhow::Result;
use console::style;
use console::Emoji;
use console::Term;
use std::path::PathBuf;

static CHECKMARK: Emoji = Emoji("✅ ", "+ ");
static CROSS: Emoji = Emoji("❌ ", "x ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static QUESTION: Emoji = Emoji("❓ ", "? ");

/// Styled terminal notifications and prompts.
pub struct Notifier {
    term: Term,
    quiet: bool,
}

impl Notifier {
    pub fn new(quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            quiet,
        }
    }

    pub fn success(&self, title: &str, message: &str) {
        if !self.quiet {
            self.print(format!("{}{} {}", CHECKMARK, style(title).green().bold(), message));
        }
    }

    pub fn info(&self, title: &str, message: &str) {
        if !self.quiet {
            self.print(format!("{}{} {}", INFO, style(title).cyan().bold(), message));
        }
    }

    /// Errors are shown even in quiet mode.
    pub fn error(&self, error: &ReportError) {
        self.print(format!("{}{} {}", CROSS, style(error.title()).red().bold(), style(error).red()));
    }

    /// Asks a yes/no question; anything but `y`/`yes` is a no.
    pub fn confirm(&self, question: &str) -> Result<bool> {
        self.term
            .write_str(&format!("{}{} [y/N]: ", QUESTION, style(question).bold()))
            .context("Failed to write prompt")?;
        let answer = self.term.read_line().context("Failed to read answer")?;
        Ok(is_yes(&answer))
    }

    /// Asks for the input folder; `None` when the answer is empty.
    pub fn prompt_folder(&self) -> Result<Option<PathBuf>> {
        self.term
            .write_str(&format!("{}{}: ", QUESTION, style("Folder containing the .xlsx files").bold()))
            .context("Failed to write prompt")?;
        let answer = self.term.read_line().context("Failed to read folder")?;
        Ok(parse_folder(&answer))
    }

    fn print(&self, line: String) {
        let _ = self.term.write_line(&line);
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn parse_folder(answer: &str) -> Option<PathBuf> {
    let folder = answer.trim().trim_matches(|c| c == '"' || c == '\'');
    if folder.is_empty() {
        None
    } else {
        Some(PathBuf::from(folder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }

    #[test]
    fn folder_answers() {
        assert_eq!(parse_folder("  \n"), None);
        assert_eq!(parse_folder("\"C:\\Reports\\Week 42\""), Some(PathBuf::from("C:\\Reports\\Week 42")));
        assert_eq!(parse_folder("./reports\n"), Some(PathBuf::from("./reports")));
    }
}
