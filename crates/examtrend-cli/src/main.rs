//! examtrend CLI — progress reports, rank trend charts, and transcripts.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use examtrend_core::config::ChartFormat;

mod commands;

#[derive(Parser)]
#[command(
    name = "examtrend",
    version,
    about = "Reconcile exam rank spreadsheets into progress reports, trend charts, and transcripts"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute each student's progress coefficient between their two latest exams
    Progress {
        /// Spreadsheet files, or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to [output].dir from the config)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Output format: csv, json, html, all
        #[arg(long, default_value = "csv")]
        format: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Draw one rank trend chart per student
    Charts {
        /// Spreadsheet files, or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to [output].dir from the config)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Chart encoding: svg or png (defaults to [chart].format)
        #[arg(long)]
        chart_format: Option<ChartFormat>,

        /// Skip unreadable or malformed files without asking
        #[arg(long, short)]
        yes: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write one full-history transcript per student
    Transcripts {
        /// Spreadsheet files, or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to [output].dir from the config)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check input spreadsheets without writing anything
    Validate {
        /// Spreadsheet files, or directories containing them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter examtrend.toml
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("examtrend=info,examtrend::diagnostics=off")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Progress {
            inputs,
            output,
            format,
            config,
        } => commands::progress::execute(inputs, output, format, config).await,
        Commands::Charts {
            inputs,
            output,
            chart_format,
            yes,
            config,
        } => commands::charts::execute(inputs, output, chart_format, yes, config).await,
        Commands::Transcripts {
            inputs,
            output,
            config,
        } => commands::transcripts::execute(inputs, output, config).await,
        Commands::Validate {
            inputs,
            json,
            config,
        } => commands::validate::execute(inputs, json, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
