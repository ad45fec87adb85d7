use crate::progress::ProgressEvent;
use crate::progress::Stage;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;
use std::time::Duration;

/// Renders pipeline progress as one terminal progress bar per stage.
pub struct TerminalProgress {
    enabled: bool,
    bar: Option<(Stage, ProgressBar)>,
}

impl TerminalProgress {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, bar: None }
    }

    /// Moves the bar of the event's stage, creating it on the first event.
    pub fn update(&mut self, event: &ProgressEvent) {
        if !self.enabled {
            return;
        }
        let bar = self.bar_for(event.stage, event.total as u64);
        bar.set_length(event.total as u64);
        bar.set_position(event.current as u64);
        bar.set_message(event.message.to_owned());
    }

    /// Clears the current bar; the next event starts a new one.
    pub fn finish(&mut self) {
        if let Some((_, bar)) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    /// Runs `f` with the bar hidden so prompts and messages are not overdrawn.
    pub fn suspend<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        match &self.bar {
            Some((_, bar)) => bar.suspend(f),
            None => f(),
        }
    }

    fn bar_for(&mut self, stage: Stage, total: u64) -> &ProgressBar {
        if self.bar.as_ref().is_some_and(|(current, _)| *current != stage) {
            self.finish();
        }
        let (_, bar) = self.bar.get_or_insert_with(|| (stage, create_bar(stage, total)));
        bar
    }
}

impl Drop for TerminalProgress {
    fn drop(&mut self) {
        self.finish();
    }
}

fn create_bar(stage: Stage, total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let unit = match stage {
        Stage::Merge => "files",
        Stage::Write => "rows",
        Stage::Extract => "steps",
    };
    bar.set_style(
        ProgressStyle::with_template(&format!(
            "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos:>5}}/{{len:5}} {unit} {{msg}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(stage: Stage, current: usize, total: usize) -> ProgressEvent {
        ProgressEvent {
            stage,
            current,
            total,
            message: format!("{stage} {current}/{total}"),
        }
    }

    #[test]
    fn one_bar_per_stage() {
        let mut progress = TerminalProgress::new(true);
        progress.update(&event(Stage::Merge, 1, 3));
        progress.update(&event(Stage::Merge, 2, 3));
        assert_eq!(progress.bar.as_ref().map(|(_, bar)| bar.position()), Some(2));

        progress.update(&event(Stage::Write, 500, 1200));
        let (stage, bar) = progress.bar.as_ref().unwrap();
        assert_eq!(*stage, Stage::Write);
        assert_eq!(bar.length(), Some(1200));
        progress.finish();
        assert!(progress.bar.is_none());
    }

    #[test]
    fn disabled_progress_draws_nothing() {
        let mut progress = TerminalProgress::new(false);
        progress.update(&event(Stage::Extract, 1, 4));
        assert!(progress.bar.is_none());
        assert_eq!(progress.suspend(|| 7), 7);
    }
}
