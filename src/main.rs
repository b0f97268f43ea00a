//! # ragline CLI
//!
//! The `ragline` binary processes documents into chunks, indexes them into a
//! vector database, and answers questions grounded in them. It can also run
//! the same operations as an HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! ragline --config ./config/ragline.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragline init` | Create the SQLite database and run schema migrations |
//! | `ragline process <project> <file>` | Split a `.txt`, `.md` or `.pdf` file into chunks |
//! | `ragline index push <project>` | Embed the project's chunks into its collection |
//! | `ragline index info <project>` | Show the project's collection |
//! | `ragline index reset <project>` | Drop the project's collection |
//! | `ragline search <project> "<query>"` | Similarity search |
//! | `ragline answer <project> "<question>"` | Grounded answer generation |
//! | `ragline projects` | List projects |
//! | `ragline serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! ragline init
//! ragline process abc123 ./docs/handbook.pdf --reset
//! ragline index push abc123 --reset
//! ragline answer abc123 "What is the refund policy?" --limit 3
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ragline::commands::{self, ProcessOptions};
use ragline::config::load_config;
use ragline::{migrate, server};

/// ragline: retrieval-augmented answers over your own documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragline.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragline",
    about = "ragline: chunk, index, and answer questions over your documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragline.toml")]
    config: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Split a file into chunks and store them under a project.
    ///
    /// Re-processing a file replaces its previous chunks.
    Process {
        /// Project identifier (ASCII letters and digits).
        project_id: String,

        /// A `.txt`, `.md` or `.pdf` file.
        file: PathBuf,

        /// Override `chunking.chunk_size`.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Override `chunking.overlap`.
        #[arg(long)]
        overlap: Option<usize>,

        /// Delete all of the project's chunks first.
        #[arg(long)]
        reset: bool,
    },

    /// Manage a project's vector index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Search a project's index.
    Search {
        project_id: String,

        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Answer a question from a project's documents.
    Answer {
        project_id: String,

        question: String,

        /// Number of documents given to the model.
        #[arg(long, default_value_t = 5)]
        limit: usize,

        /// Template language (falls back to `templates.default_language`).
        #[arg(long)]
        language: Option<String>,

        /// Print the system message and prompt before the answer.
        #[arg(long)]
        show_prompt: bool,
    },

    /// List projects.
    Projects {
        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },

    /// Start the HTTP server on `server.bind`.
    Serve,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Embed all of the project's chunks into its collection.
    Push {
        project_id: String,

        /// Drop the collection before indexing.
        #[arg(long)]
        reset: bool,
    },
    /// Show the collection's size, metric, and point count.
    Info { project_id: String },
    /// Drop the collection.
    Reset { project_id: String },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&config).await?;
            println!("Database initialized at {}", config.db.path.display());
        }
        Commands::Process {
            project_id,
            file,
            chunk_size,
            overlap,
            reset,
        } => {
            commands::run_process(
                &config,
                ProcessOptions {
                    project_id: &project_id,
                    file: &file,
                    chunk_size,
                    overlap,
                    do_reset: reset,
                },
            )
            .await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Push { project_id, reset } => {
                commands::run_index_push(&config, &project_id, reset).await?;
            }
            IndexAction::Info { project_id } => {
                commands::run_index_info(&config, &project_id).await?;
            }
            IndexAction::Reset { project_id } => {
                commands::run_index_reset(&config, &project_id).await?;
            }
        },
        Commands::Search {
            project_id,
            query,
            limit,
        } => {
            commands::run_search(&config, &project_id, &query, limit).await?;
        }
        Commands::Answer {
            project_id,
            question,
            limit,
            language,
            show_prompt,
        } => {
            commands::run_answer(
                &config,
                &project_id,
                &question,
                limit,
                language.as_deref(),
                show_prompt,
            )
            .await?;
        }
        Commands::Projects { page, page_size } => {
            commands::run_projects(&config, page, page_size).await?;
        }
        Commands::Serve => {
            server::run_server(&config).await?;
        }
    }

    Ok(())
}
