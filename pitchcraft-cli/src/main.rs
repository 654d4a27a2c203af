//! Pitchcraft CLI: drafts research-backed proposal decks from RFP text.

mod commands;

use chrono::NaiveDate;
use clap::Parser;
use pitchcraft_core::{DepthTier, Tone};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Pitchcraft: research-backed proposal drafts from RFP documents
#[derive(Parser, Debug)]
#[command(name = "pitchcraft", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds .pitchcraft/config.toml and saved drafts)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline on a plain-text RFP
    Run(RunArgs),
    /// List the slide template catalog
    Templates,
    /// Show slide statuses, the unresolved manifest and references of a saved draft
    Inspect {
        /// Draft JSON file (defaults to the most recent draft in the workspace)
        draft: Option<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Plain-text RFP file
    #[arg(long)]
    rfp: PathBuf,

    /// Optional summary of the RFP
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Research depth: default or advanced
    #[arg(long, default_value = "default")]
    tier: DepthTier,

    /// Client name
    #[arg(long)]
    client: String,

    /// Project title
    #[arg(long)]
    title: String,

    /// Tone: formal, consultative, persuasive, technical, friendly
    #[arg(long, default_value = "formal")]
    tone: Tone,

    /// Comma-separated emphasis keywords
    #[arg(long, value_delimiter = ',')]
    emphasis: Vec<String>,

    /// Team or firm preparing the proposal
    #[arg(long)]
    team: Option<String>,

    /// Accent colour for rendering, e.g. #0A5FFF
    #[arg(long)]
    accent: Option<String>,

    /// Date printed on the cover (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    prepared_on: Option<NaiveDate>,

    /// Where to write the draft (defaults to .pitchcraft/drafts/<run-id>.json)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Use the offline heuristic model and no search providers
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default .pitchcraft/config.toml into the workspace
    Init,
    /// Print the effective configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "pitchcraft", "pitchcraft")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "pitchcraft.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("pitchcraft_core=debug,pitchcraft=debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.quiet).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "pitchcraft",
            "run",
            "--rfp",
            "rfp.txt",
            "--client",
            "Acme",
            "--title",
            "Migration",
            "--tier",
            "advanced",
            "--tone",
            "persuasive",
            "--emphasis",
            "security,cost",
            "--prepared-on",
            "2025-03-14",
            "--dry-run",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.tier, DepthTier::Advanced);
                assert_eq!(args.tone, Tone::Persuasive);
                assert_eq!(args.emphasis, vec!["security", "cost"]);
                assert_eq!(args.prepared_on, NaiveDate::from_ymd_opt(2025, 3, 14));
                assert!(args.dry_run);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_tier() {
        let result = Cli::try_parse_from([
            "pitchcraft",
            "run",
            "--rfp",
            "r.txt",
            "--client",
            "A",
            "--title",
            "T",
            "--tier",
            "gold",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parses_inspect_without_path() {
        let cli = Cli::try_parse_from(["pitchcraft", "inspect", "-v"]).unwrap();
        assert!(matches!(cli.command, Commands::Inspect { draft: None }));
        assert_eq!(cli.verbose, 1);
    }
}
