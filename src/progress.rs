//! Progress reporting between the pipeline and whoever renders it.

use std::fmt::Display;
use std::sync::mpsc::Sender;

/// Pipeline step a progress update belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Reading input files, counted in files
    Merge,
    /// Writing the merged workbook, counted in rows
    Write,
    /// Read, filter, sample and save steps of the extraction, counted 0..4
    Extract,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Merge => write!(f, "merge"),
            Stage::Write => write!(f, "write"),
            Stage::Extract => write!(f, "extract"),
        }
    }
}

/// Receives status text and bounded progress from a running pipeline.
pub trait ProgressReporter: Sync {
    fn report(&self, stage: Stage, current: usize, total: usize, message: &str);
}

impl<F> ProgressReporter for F
where
    F: Fn(Stage, usize, usize, &str) + Sync,
{
    fn report(&self, stage: Stage, current: usize, total: usize, message: &str) {
        self(stage, current, total, message)
    }
}

/// Discards every update.
#[derive(Copy, Clone, Debug, Default)]
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {
    fn report(&self, _stage: Stage, _current: usize, _total: usize, _message: &str) {}
}

/// One progress update as sent across threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Forwards updates to a channel; a dropped receiver is ignored.
pub struct ChannelReporter {
    sender: Sender<ProgressEvent>,
}

impl ChannelReporter {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        ChannelReporter { sender }
    }
}

impl ProgressReporter for ChannelReporter {
    fn report(&self, stage: Stage, current: usize, total: usize, message: &str) {
        let event = ProgressEvent {
            stage,
            current,
            total,
            message: message.to_owned(),
        };
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::sync::Mutex;

    #[test]
    fn channel_reporter_forwards_events() {
        let (sender, receiver) = channel();
        let reporter = ChannelReporter::new(sender);
        reporter.report(Stage::Merge, 1, 3, "a.xlsx");
        drop(reporter);

        let events: Vec<ProgressEvent> = receiver.iter().collect();
        assert_eq!(
            events,
            vec![ProgressEvent {
                stage: Stage::Merge,
                current: 1,
                total: 3,
                message: "a.xlsx".to_owned(),
            }]
        );
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (sender, receiver) = channel();
        drop(receiver);
        ChannelReporter::new(sender).report(Stage::Write, 500, 1000, "writing");
    }

    #[test]
    fn closures_are_reporters() {
        let seen = Mutex::new(Vec::new());
        let reporter = |stage: Stage, current: usize, _: usize, _: &str| seen.lock().unwrap().push((stage, current));
        reporter.report(Stage::Extract, 2, 4, "sampling");
        assert_eq!(seen.into_inner().unwrap(), vec![(Stage::Extract, 2)]);
    }
}
