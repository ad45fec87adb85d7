use clap::Parser;
use ppt_report::cli::Cli;
use ppt_report::cli::Confirmation;
use ppt_report::pipeline;
use ppt_report::pipeline::Task;
use ppt_report::progress::ProgressEvent;
use ppt_report::ui::Notifier;
use ppt_report::ui::TerminalProgress;
use ppt_report::ExtractOutcome;
use ppt_report::ReportError;
use ppt_report::RunState;
use std::process;
use tracing::debug;
use tracing::error;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);
    process::exit(run(&cli));
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> i32 {
    let notifier = Notifier::new(cli.quiet);
    let config = cli.config();

    let folder = match &cli.folder {
        Some(folder) => folder.to_owned(),
        None => match notifier.prompt_folder() {
            Ok(Some(folder)) => folder,
            Ok(None) => return 0,
            Err(e) => {
                error!("{e:#}");
                return 1;
            }
        },
    };

    let mut state = RunState::Idle;
    transition(&mut state, RunState::Merging);
    let task = {
        let folder = folder.to_owned();
        let config = config.clone();
        Task::spawn(move |reporter| pipeline::merge_directory(&folder, &config, reporter))
    };
    let merged = match follow(task, cli.quiet, |_| {}) {
        Ok(outcome) => outcome,
        Err(e) => return fail(&notifier, &mut state, RunState::MergeFailed, &e),
    };
    transition(&mut state, RunState::Merged);
    notifier.success(
        "Merge finished",
        &format!("{} file(s), {} row(s) saved to {}", merged.files, merged.table.len(), merged.output.display()),
    );

    transition(&mut state, RunState::AwaitingConfirmation);
    let extract = match cli.confirmation() {
        Confirmation::Extract => true,
        Confirmation::Skip => false,
        Confirmation::Ask => match notifier.confirm("Filter and extract the merged records now?") {
            Ok(answer) => answer,
            Err(e) => {
                error!("{e:#}");
                return 1;
            }
        },
    };
    if !extract {
        transition(&mut state, RunState::Skipped);
        return 0;
    }

    transition(&mut state, RunState::Filtering);
    let task = {
        let merged_path = merged.output.to_owned();
        Task::spawn(move |reporter| pipeline::filter_and_extract(&merged_path, &config, reporter))
    };
    let outcome = follow(task, cli.quiet, |event| {
        for next in RunState::entered_on(event) {
            transition(&mut state, *next);
        }
    });
    match outcome {
        Ok(ExtractOutcome::Empty) => {
            transition(&mut state, RunState::EmptyResult);
            notifier.info("Empty result", "No record matches the filter.");
            0
        }
        Ok(ExtractOutcome::Written { path, matched, sampled }) => {
            transition(&mut state, RunState::Done);
            notifier.success(
                "Extraction finished",
                &format!("{sampled} of {matched} matching record(s) saved to {}", path.display()),
            );
            0
        }
        Err(e) => {
            let failed = RunState::after_extract_error(&e);
            fail(&notifier, &mut state, failed, &e)
        }
    }
}

/// Renders the task's progress until it finishes, then returns its result.
fn follow<T, F>(task: Task<T>, quiet: bool, mut on_event: F) -> Result<T, ReportError>
where
    T: Send + 'static,
    F: FnMut(&ProgressEvent),
{
    let mut progress = TerminalProgress::new(!quiet);
    for event in task.events() {
        debug!(stage = %event.stage, current = event.current, total = event.total, "{}", event.message);
        progress.update(&event);
        on_event(&event);
    }
    progress.finish();
    task.join()
}

fn transition(state: &mut RunState, next: RunState) {
    debug!(from = ?state, to = ?next, "state change");
    *state = next;
}

fn fail(notifier: &Notifier, state: &mut RunState, failed: RunState, e: &ReportError) -> i32 {
    transition(state, failed);
    error!(state = ?failed, "{e}");
    notifier.error(e);
    e.exit_code()
}
