//! # evalboard CLI
//!
//! ```bash
//! evalboard --config ./config/evalboard.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `evalboard init` | Create the SQLite database and run schema migrations |
//! | `evalboard serve` | Start the HTTP API |
//! | `evalboard reviews` | Print the model leaderboard |
//! | `evalboard stats` | Summarize collected feedback |
//! | `evalboard export` | Dump all feedback as JSON |
//! | `evalboard import <file>` | Restore feedback from an export |
//! | `evalboard hash-token <token>` | Print the digest to put in `[[auth.tokens]]` |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use evalboard::{auth, config, export, migrate, reviews, server, stats};

/// evalboard: feedback collection and confidence-weighted model reviews
/// for self-hosted LLM chat gateways.
#[derive(Parser)]
#[command(name = "evalboard", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/evalboard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite file and applies pending migrations. Safe to run
    /// more than once.
    Init,

    /// Start the HTTP API.
    ///
    /// Binds to `[server].bind` and serves `/api/v1/evaluations`.
    Serve,

    /// Print models ranked by confidence-weighted review score.
    Reviews {
        /// Print the JSON body served by `GET /reviews` instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show feedback counts by type and by model.
    Stats,

    /// Export every feedback row as JSON.
    Export {
        /// Output file. Defaults to stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Import feedback rows from a JSON export (upsert by id).
    Import {
        /// Path to a file produced by `export` or `GET /feedbacks/all/export`.
        file: PathBuf,
    },

    /// Print the SHA-256 digest of a bearer token for `[[auth.tokens]]`.
    HashToken {
        token: String,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evalboard=info,tower_http=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Commands that don't require config
    if let Commands::HashToken { token } = &cli.command {
        println!("{}", auth::hash_token(token));
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Reviews { json } => {
            reviews::run_reviews(&cfg, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { output } => {
            export::run_export(&cfg, output.as_deref()).await?;
        }
        Commands::Import { file } => {
            export::run_import(&cfg, &file).await?;
        }
        Commands::HashToken { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
