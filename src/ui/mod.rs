//! Terminal rendering of progress, notifications and prompts.

pub mod notify;
pub mod progress;

pub use notify::Notifier;
pub use progress::TerminalProgress;
