//! # boardsmith
//!
//! Assembles the publication pipeline from configuration and runs one
//! maintenance command against it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use configs::schema::editor_rows;
use configs::{AppConfig, LoggingConfig};
use domains::{NewBoard, SpamChecker, SystemClock};
use render_adapters::AskamaRenderer;
use services::{ActionRegistry, Ports, PublicationPipeline};
use storage_adapters::{LocalMediaStore, LocalSiteFilesystem, SqliteStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "boardsmith", version, about = "Publishes an imageboard as static pages")]
struct Cli {
    /// Configuration file; `boardsmith.toml` in the working directory is used when present
    #[arg(long, short = 'c', global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Regenerate static pages for every board, or just one
    Rebuild {
        #[arg(long, value_name = "DIR")]
        board: Option<String>,
    },
    /// Create a board and publish its empty pages
    NewBoard {
        dir: String,
        title: String,
        #[arg(long, default_value = "")]
        subtitle: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Defaults to the board's configured limit
        #[arg(long)]
        max_message_length: Option<i64>,
    },
    /// Show the effective settings of a board
    BoardConfig { dir: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&app.logging)?;

    if let Command::BoardConfig { dir } = &cli.command {
        for row in editor_rows(&app.board_config(dir)) {
            let marker = if row.is_default { "" } else { "  (overridden)" };
            println!("{:<30} {}{}", row.field.name, row.value, marker);
        }
        return Ok(());
    }

    let store = Arc::new(
        SqliteStore::connect(app.database_url(), app.database.max_connections)
            .await
            .context("opening database")?,
    );
    store.migrate().await.context("migrating database")?;

    let pipeline = assemble(&app, store)?;
    match cli.command {
        Command::Migrate => println!("database is up to date"),
        Command::Rebuild { board: Some(dir) } => {
            let summary = pipeline.rebuild_board(&dir).await?;
            println!("rebuilt /{}/: {} pages, {} threads", dir, summary.board_pages, summary.threads);
        }
        Command::Rebuild { board: None } => {
            let summary = pipeline.rebuild_all().await?;
            println!(
                "rebuilt {} boards: {} pages, {} threads",
                summary.boards, summary.board_pages, summary.threads
            );
        }
        Command::NewBoard { dir, title, subtitle, description, max_message_length } => {
            let board = pipeline
                .create_board(NewBoard {
                    dir,
                    title,
                    subtitle,
                    description,
                    max_message_length: max_message_length.unwrap_or(0),
                })
                .await?;
            println!("created /{}/ (id {})", board.dir, board.id);
        }
        Command::BoardConfig { .. } => {}
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("invalid logging.level '{}'", logging.level))?,
    };
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| anyhow!(err))
}

fn assemble(app: &AppConfig, store: Arc<SqliteStore>) -> Result<PublicationPipeline> {
    let settings = Arc::new(app.site_settings()?);
    let files = LocalSiteFilesystem::from_settings(&settings);
    info!(
        document_root = %settings.document_root.display(),
        web_root = %settings.web_root,
        "publishing site"
    );

    let ports = Ports {
        content: store.clone(),
        moderation: store,
        media: Arc::new(LocalMediaStore::new(files.clone())),
        files: Arc::new(files),
        renderer: Arc::new(AskamaRenderer::new()),
        spam: spam_checker(app),
        clock: Arc::new(SystemClock),
    };
    Ok(PublicationPipeline::new(ports, settings, Arc::new(ActionRegistry::with_defaults())))
}

#[cfg(feature = "spam-dnsbl")]
fn spam_checker(app: &AppConfig) -> Arc<dyn SpamChecker> {
    use storage_adapters::{CombinedSpamCheck, DnsblSpamChecker};

    const LOOKUP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);
    let checkers = app
        .spam
        .dnsbl_zones
        .iter()
        .map(|zone| Arc::new(DnsblSpamChecker::new(zone.as_str(), LOOKUP_TIMEOUT)) as Arc<dyn SpamChecker>)
        .collect();
    Arc::new(CombinedSpamCheck::new(checkers))
}

#[cfg(not(feature = "spam-dnsbl"))]
fn spam_checker(app: &AppConfig) -> Arc<dyn SpamChecker> {
    if !app.spam.dnsbl_zones.is_empty() {
        tracing::warn!("spam.dnsbl_zones is set but this build has no DNSBL support; spam checks are off");
    }
    Arc::new(storage_adapters::NoSpamCheck)
}
