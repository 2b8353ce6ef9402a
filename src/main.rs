use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ledgerlens::cli::{self, Corrections, RenderOptions};
use ledgerlens::config::LedgerConfig;
use ledgerlens::logging::{init_logging, log_system_info, LoggingConfig};
use ledgerlens::table::CellRef;

#[derive(Parser)]
#[command(name = "ledgerlens")]
#[command(about = "Review and correct tables extracted from scanned financial statements")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also write rotated log files to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a document to the extraction backend and save the result
    Extract {
        /// Scanned statement (PDF or image)
        file: PathBuf,

        /// Snapshot path (defaults to <output_dir>/<stem>_extraction.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a page with its token overlay to PNG
    Render {
        /// Extraction snapshot
        document: PathBuf,

        /// Token file (defaults to <token_dir>/<stem>.json)
        #[arg(short, long)]
        tokens: Option<PathBuf>,

        #[arg(short, long, default_value_t = 0)]
        page: usize,

        /// Zoom steps from 100% (negative zooms out)
        #[arg(short, long, default_value_t = 0, allow_hyphen_values = true)]
        zoom: i32,

        /// Select a cell first so every token is drawn (ROW:COLUMN)
        #[arg(short, long, value_parser = cli::parse_cell)]
        select: Option<CellRef>,

        #[arg(short, long, default_value = "overlay.png")]
        output: PathBuf,
    },

    /// Check that every row balances
    Check {
        /// Extraction snapshot
        document: PathBuf,
    },

    /// Apply corrections, send them to the backend and save a local copy
    Submit {
        /// Extraction snapshot
        document: PathBuf,

        /// Original file name the corrected copy is named after
        #[arg(short, long)]
        name: Option<String>,

        /// Token file (defaults to <token_dir>/<stem>.json)
        #[arg(short, long)]
        tokens: Option<PathBuf>,

        /// Bind a token to a cell (ROW:COLUMN=TOKEN), repeatable
        #[arg(short, long = "bind", value_parser = cli::parse_binding)]
        bindings: Vec<(CellRef, String)>,

        /// Reset a cell to its default (ROW:COLUMN), repeatable
        #[arg(long = "clear", value_parser = cli::parse_cell)]
        clears: Vec<CellRef>,

        /// Replace a cell's text, keeping its token (ROW:COLUMN=TEXT), repeatable
        #[arg(short, long = "edit", value_parser = cli::parse_binding)]
        edits: Vec<(CellRef, String)>,
    },

    /// Show the effective configuration
    Config {
        /// Write the configuration to this path instead of printing it
        #[arg(long)]
        init: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        enable_file_logging: cli.log_dir.is_some(),
        log_dir: cli.log_dir.clone().unwrap_or_else(|| PathBuf::from("logs")),
        enable_json_format: cli.json_logs,
    })?;
    log_system_info();

    let config = LedgerConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { file, output } => cli::extract_command(&config, file, output).await,
        Commands::Render {
            document,
            tokens,
            page,
            zoom,
            select,
            output,
        } => {
            let session = cli::open_session(&config, &document, tokens.as_deref(), None)?;
            let options = RenderOptions {
                page,
                zoom_steps: zoom,
                select,
                output,
            };
            cli::render_command(session, &config, options).await
        }
        Commands::Check { document } => {
            let session = cli::open_session(&config, &document, None, None)?;
            let invalid = cli::check_command(&session)?;
            if invalid > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Submit {
            document,
            name,
            tokens,
            bindings,
            clears,
            edits,
        } => {
            let session = cli::open_session(&config, &document, tokens.as_deref(), name.as_deref())?;
            let corrections = Corrections {
                bindings,
                clears,
                edits,
            };
            cli::submit_command(session, &config, corrections).await
        }
        Commands::Config { init } => cli::config_command(&config, init),
    }
}
