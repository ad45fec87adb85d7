//! Background execution of one pipeline stage.

use crate::error::ReportError;
use crate::progress::ChannelReporter;
use crate::progress::ProgressEvent;
use crate::progress::ProgressReporter;
use std::sync::mpsc::channel;
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;

/// A stage running on its own worker thread.
///
/// Progress arrives through [`Task::events`], which ends once the worker
/// returns; [`Task::join`] then yields the result.
pub struct Task<T> {
    events: Receiver<ProgressEvent>,
    handle: JoinHandle<Result<T, ReportError>>,
}

impl<T: Send + 'static> Task<T> {
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(&dyn ProgressReporter) -> Result<T, ReportError> + Send + 'static,
    {
        let (sender, events) = channel();
        let handle = std::thread::spawn(move || {
            let reporter = ChannelReporter::new(sender);
            work(&reporter)
        });
        Task { events, handle }
    }

    /// Blocking iterator over progress updates.
    pub fn events(&self) -> impl Iterator<Item = ProgressEvent> + '_ {
        self.events.iter()
    }

    /// Waits for the worker; a panic becomes [`ReportError::Worker`].
    pub fn join(self) -> Result<T, ReportError> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|message| message.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "worker thread panicked".to_owned());
                Err(ReportError::Worker(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Stage;

    #[test]
    fn events_then_result() {
        let task = Task::spawn(|reporter| {
            reporter.report(Stage::Extract, 1, 4, "read");
            reporter.report(Stage::Extract, 2, 4, "filtered");
            Ok(42)
        });
        let positions: Vec<usize> = task.events().map(|event| event.current).collect();
        assert_eq!(positions, vec![1, 2]);
        assert_eq!(task.join().unwrap(), 42);
    }

    #[test]
    fn errors_are_returned() {
        let task: Task<()> = Task::spawn(|_| Err(ReportError::Worker("boom".to_owned())));
        assert_eq!(task.events().count(), 0);
        assert!(matches!(task.join(), Err(ReportError::Worker(message)) if message == "boom"));
    }

    #[test]
    fn panics_become_worker_errors() {
        let task: Task<()> = Task::spawn(|_| panic!("worker exploded"));
        match task.join() {
            Err(ReportError::Worker(message)) => assert_eq!(message, "worker exploded"),
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }
}
