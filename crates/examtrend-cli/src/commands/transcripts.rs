//! The `examtrend transcripts` command.

use std::path::PathBuf;

use anyhow::Result;

use super::charts::report_emitted;
use super::{finish, run_job, Session};

pub async fn execute(
    inputs: Vec<PathBuf>,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let session = Session::load(&inputs, config_path)?;
    let output_dir = session.require_output_dir(output)?;

    eprintln!("Reading {} spreadsheet(s)", session.inputs.len());
    let engine = session.engine();
    let files = session.inputs.clone();
    let outcome = run_job("transcripts", session.poll_interval(), move |ctx| {
        engine.transcripts(&files, &output_dir, &ctx)
    })
    .await?;

    if let Some(summary) = finish(outcome)? {
        report_emitted("transcript", &summary);
    }
    Ok(())
}
