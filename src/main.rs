use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use discussion_prompts::api::{self, AppState};
use discussion_prompts::config::Config;
use discussion_prompts::db::Database;
use discussion_prompts::models::DiscussionResponse;

#[derive(Parser)]
#[command(name = "dprompt")]
#[command(about = "Audio discussion prompts for task comments")]
struct Cli {
    /// Root directory for discussion audio (overrides config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// SQLite database file (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port for HTTP API
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Package a discussion's prompts into its task archive
    Archive {
        discussion_id: Uuid,
    },
    /// Show a discussion's status and due date
    Status {
        discussion_id: Uuid,
    },
    /// Print the effective configuration
    Config {
        /// Also write it to the config file
        #[arg(long)]
        write: bool,
    },
}

/// Initialize tracing with output to stderr (for CLI commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "discussion_prompts=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // One-shot commands print results on stdout
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    let db = match &config.db_path {
        Some(path) => Database::open(path.clone())?,
        None => Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let db = open_database(&config)?;
    let app = api::create_router(AppState::new(db, config.data_dir.clone()));

    let addr = config.listen_addr();
    tracing::info!("Storing discussion audio under {}", config.data_dir.display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Discussion prompt server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = matches!(
        cli.command,
        Some(Commands::Archive { .. })
            | Some(Commands::Status { .. })
            | Some(Commands::Config { .. })
    );
    init_tracing(use_stderr);

    let mut config = Config::load();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }

    match cli.command {
        Some(Commands::Serve { port, bind }) => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(bind) = bind {
                config.bind = bind;
            }
            serve(config).await?;
        }
        Some(Commands::Archive { discussion_id }) => {
            let db = open_database(&config)?;
            let state = AppState::new(db, config.data_dir.clone());

            let discussion = state
                .db
                .get_discussion_comment(discussion_id)?
                .context("Discussion not found")?;
            let comment = state
                .db
                .get_task_comment(discussion.task_comment_id)?
                .context("Task comment not found")?;

            let archive = state.prompts.package(&comment)?;
            println!(
                "Wrote {} prompt(s) to {}",
                archive.entries.len(),
                archive.path.display()
            );
        }
        Some(Commands::Status { discussion_id }) => {
            let db = open_database(&config)?;
            let discussion = db
                .get_discussion_comment(discussion_id)?
                .context("Discussion not found")?;

            let response = DiscussionResponse::from(discussion);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Some(Commands::Config { write }) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            if write {
                config.save()?;
            }
        }
        None => serve(config).await?,
    }

    Ok(())
}
