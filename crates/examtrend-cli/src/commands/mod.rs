pub mod charts;
pub mod init;
pub mod progress;
pub mod transcripts;
pub mod validate;

use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use examtrend_core::config::{load_config_from, ExamtrendConfig};
use examtrend_core::diagnostics::Diagnostic;
use examtrend_core::engine::{EngineConfig, ExamEngine, Outcome};
use examtrend_core::job::{spawn_job, JobContext};
use examtrend_core::traits::Confirm;
use examtrend_report::PlottersRenderer;
use examtrend_sheets::{collect_inputs, CsvTableWriter, SheetReader};

/// Config plus the expanded list of input files.
pub struct Session {
    pub config: ExamtrendConfig,
    pub inputs: Vec<PathBuf>,
}

impl Session {
    pub fn load(inputs: &[PathBuf], config_path: Option<PathBuf>) -> Result<Self> {
        let config = load_config_from(config_path.as_deref())?;
        let inputs = collect_inputs(inputs)?;
        anyhow::ensure!(!inputs.is_empty(), "no input spreadsheets found");
        Ok(Self { config, inputs })
    }

    /// Output directory from the flag, else the config.
    pub fn output_dir(&self, flag: Option<PathBuf>) -> Option<PathBuf> {
        flag.or_else(|| self.config.output.dir.clone())
    }

    pub fn require_output_dir(&self, flag: Option<PathBuf>) -> Result<PathBuf> {
        self.output_dir(flag)
            .context("no output directory: pass --output or set [output] dir in examtrend.toml")
    }

    pub fn engine(&self) -> ExamEngine {
        ExamEngine::new(
            Arc::new(SheetReader),
            Arc::new(CsvTableWriter),
            Arc::new(PlottersRenderer::from_config(&self.config.chart)),
            EngineConfig::from(&self.config),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.job.poll_interval_ms)
    }
}

/// Prints diagnostics to stderr. Progress is shown in 10% steps.
#[derive(Default)]
struct ConsoleSink {
    last_step: Option<u32>,
}

impl ConsoleSink {
    fn show(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::Info(m) => eprintln!("  {m}"),
            Diagnostic::Warning(m) => eprintln!("  WARNING: {m}"),
            Diagnostic::Error(m) => eprintln!("  ERROR: {m}"),
            Diagnostic::Progress(p) => {
                let step = (p / 10.0).floor() as u32;
                if self.last_step != Some(step) {
                    self.last_step = Some(step);
                    eprintln!("  [{p:>5.1}%]");
                }
            }
        }
    }
}

/// Run `work` as a background job, printing its diagnostics as they arrive.
/// Ctrl-C cancels the job at its next checkpoint.
pub async fn run_job<T, F>(name: &'static str, poll: Duration, work: F) -> Result<Outcome<T>>
where
    F: FnOnce(JobContext) -> Outcome<T> + Send + 'static,
    T: Send + 'static,
{
    let handle = spawn_job(name, work);
    let cancel = handle.cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("  interrupted; stopping at the next checkpoint");
            cancel.cancel();
        }
    });

    let mut sink = ConsoleSink::default();
    let outcome = handle.drive(poll, |d| sink.show(d)).await;
    interrupt.abort();
    outcome
}

/// `Completed` → `Some`, `Canceled` → `None`, `Failed` → error.
pub fn finish<T>(outcome: Outcome<T>) -> Result<Option<T>> {
    match outcome {
        Outcome::Completed(value) => Ok(Some(value)),
        Outcome::Canceled => Ok(None),
        Outcome::Failed(e) => Err(anyhow::Error::new(e).context("operation failed")),
    }
}

/// Asks on the terminal. Declines when stdin is not interactive.
pub struct StdinConfirm {
    pub assume_yes: bool,
}

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        let stdin = std::io::stdin();
        if !stdin.is_terminal() {
            eprintln!("  {prompt} [y/N] n (not a terminal; pass --yes to skip bad files)");
            return false;
        }

        eprint!("  {prompt} [y/N] ");
        let _ = std::io::stderr().flush();
        let mut answer = String::new();
        if stdin.lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    }
}
