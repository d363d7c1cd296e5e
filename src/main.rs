//! `scout` — CLI for the code-search service.
//!
//! Subcommands map one-to-one onto the tool surface (`search`, `advanced`,
//! `similar`, `types`, `context`, `memories`, `status`), plus `serve` for
//! the HTTP tool server and `compact` for the offline memory compactor.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use code_scout::llm::LlmClient;
use code_scout::models::ChunkType;
use code_scout::store::http::HttpStore;
use code_scout::store::Store;
use code_scout::{config, context, memory, search, server, status};

#[derive(Parser)]
#[command(
    name = "scout",
    about = "Code Scout — a retrieval-augmented code-search service for coding agents",
    version
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./config/scout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP tool server
    Serve,

    /// Search indexed code
    Search {
        /// Search query
        query: String,

        /// Project to search in
        #[arg(long)]
        project: Option<String>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<usize>,

        /// Restrict to chunk types (function, class, component, hook, service, migration)
        #[arg(long, value_delimiter = ',')]
        chunk_types: Option<Vec<ChunkType>>,

        /// Keyword/vector blend in [0, 1]
        #[arg(long)]
        alpha: Option<f64>,

        /// Expand the query before searching
        #[arg(long)]
        rewrite: bool,

        /// Truncate results at the largest score gap
        #[arg(long)]
        autocut: bool,
    },

    /// Reflexion search: multiple strategies with early termination
    Advanced {
        /// Search query
        query: String,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_delimiter = ',')]
        chunk_types: Option<Vec<ChunkType>>,

        /// Top score an attempt must reach to stop early
        #[arg(long)]
        threshold: Option<f64>,

        /// Maximum strategies to try
        #[arg(long)]
        max_attempts: Option<usize>,
    },

    /// Find code similar to a snippet
    Similar {
        /// Code snippet to match
        code: String,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Search type definitions
    Types {
        query: String,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Build a dependency-aware context bundle for a file
    Context {
        /// Project-relative file path
        file: String,

        #[arg(long)]
        project: Option<String>,

        /// Cap on related files
        #[arg(long)]
        max_files: Option<usize>,

        /// Skip referenced type definitions
        #[arg(long)]
        no_types: bool,
    },

    /// Search conversation memories
    Memories {
        query: String,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show index status
    Status,

    /// Compact aged conversation memories
    Compact {
        #[command(subcommand)]
        action: Option<CompactCmd>,

        /// Compact memories older than this many days
        #[arg(long)]
        days: Option<i64>,

        /// Minimum memories per project before compaction
        #[arg(long = "min-group")]
        min_group: Option<usize>,

        /// Plan without inserting or deleting
        #[arg(long)]
        dry_run: bool,

        /// Debug-level logging
        #[arg(long)]
        verbose: bool,
    },
}

#[derive(Subcommand)]
enum CompactCmd {
    /// Run a compaction pass (default)
    Run,
    /// Show memory statistics without changing anything
    Stats,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn connect_store(cfg: &config::Config) -> anyhow::Result<Arc<dyn Store>> {
    Ok(Arc::new(HttpStore::new(&cfg.store)?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    let verbose = matches!(&cli.command, Commands::Compact { verbose: true, .. });
    init_tracing(verbose);

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Search {
            query,
            project,
            limit,
            chunk_types,
            alpha,
            rewrite,
            autocut,
        } => {
            let store = connect_store(&cfg)?;
            let opts = search::BasicSearchOptions {
                project: project.unwrap_or_else(|| cfg.search.default_project.clone()),
                limit: limit.unwrap_or(cfg.search.default_limit),
                chunk_types,
                alpha: alpha.unwrap_or(cfg.search.default_alpha),
                rewrite,
                autocut,
            };
            search::run_basic_search(store.as_ref(), &query, &opts).await?;
        }
        Commands::Advanced {
            query,
            project,
            limit,
            chunk_types,
            threshold,
            max_attempts,
        } => {
            let store = connect_store(&cfg)?;
            let opts = search::AdvancedSearchOptions {
                project: project.unwrap_or_else(|| cfg.search.default_project.clone()),
                limit: limit.unwrap_or(cfg.search.default_limit),
                chunk_types,
                threshold: threshold.unwrap_or(cfg.search.threshold),
                max_attempts: max_attempts.unwrap_or(cfg.search.max_attempts),
            };
            search::run_advanced_search(store.as_ref(), &query, &opts).await?;
        }
        Commands::Similar {
            code,
            project,
            limit,
        } => {
            let store = connect_store(&cfg)?;
            let opts = search::SimilarityOptions {
                project: project.unwrap_or_else(|| cfg.search.default_project.clone()),
                limit: limit.unwrap_or(cfg.search.default_limit),
            };
            search::run_similarity_search(store.as_ref(), &code, &opts).await?;
        }
        Commands::Types {
            query,
            project,
            limit,
        } => {
            let store = connect_store(&cfg)?;
            let opts = search::TypeSearchOptions {
                project: project.unwrap_or_else(|| cfg.search.default_project.clone()),
                limit: limit.unwrap_or(cfg.search.default_limit),
            };
            search::run_type_search(store.as_ref(), &query, &opts).await?;
        }
        Commands::Context {
            file,
            project,
            max_files,
            no_types,
        } => {
            let store = connect_store(&cfg)?;
            let opts = context::ContextOptions {
                project: project.unwrap_or_else(|| cfg.search.default_project.clone()),
                max_files: max_files.unwrap_or(cfg.context.max_files),
                include_types: !no_types,
                aliases: cfg.context.aliases.clone(),
            };
            context::run_context(store.as_ref(), &file, &opts).await?;
        }
        Commands::Memories {
            query,
            project,
            limit,
        } => {
            let store = connect_store(&cfg)?;
            let opts = search::MemorySearchOptions {
                project,
                limit: limit.unwrap_or(5),
            };
            search::run_memory_search(store.as_ref(), &query, &opts).await?;
        }
        Commands::Status => {
            let store = connect_store(&cfg)?;
            status::run_status(store.as_ref()).await?;
        }
        Commands::Compact {
            action,
            days,
            min_group,
            dry_run,
            ..
        } => {
            let store = connect_store(&cfg)?;
            let older_than_days = days.unwrap_or(cfg.compaction.older_than_days);

            match action.unwrap_or(CompactCmd::Run) {
                CompactCmd::Run => {
                    let llm = LlmClient::from_config(&cfg.llm)?;
                    let opts = memory::CompactionOptions {
                        older_than_days,
                        min_group_size: min_group.unwrap_or(cfg.compaction.min_group_size),
                        dry_run,
                    };
                    let report = memory::run_compaction_cli(
                        store.as_ref(),
                        llm.as_ref(),
                        &cfg.llm.summarise_model,
                        &opts,
                    )
                    .await?;
                    if !report.errors.is_empty() {
                        std::process::exit(1);
                    }
                }
                CompactCmd::Stats => {
                    memory::run_memory_stats(store.as_ref(), older_than_days).await?;
                }
            }
        }
    }

    Ok(())
}
