use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dayfeed::app::App;
use dayfeed::config::Config;
use dayfeed::insight::SummaryRequest;
use dayfeed::storage::{Database, SqlitePersistence, StorageError};
use dayfeed::ui;
use dayfeed::util::strip_control_chars;

const DEFAULT_WIDTH: u16 = 80;

/// Get the config directory path (~/.config/dayfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("dayfeed"))
}

/// Writes `content` to `dst` through a temp file and rename, so `dst` is
/// never left half-written.
fn atomic_write(dst: &Path, content: &[u8]) -> Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| format!("Failed to create temporary file '{}'", temp_path.display()))?;

    temp_file.write_all(content).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to write '{}': disk may be full", temp_path.display())
    })?;

    temp_file.sync_all().with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!("Failed to sync '{}' to disk", temp_path.display())
    })?;
    drop(temp_file);

    #[cfg(windows)]
    if dst.exists() {
        std::fs::remove_file(dst).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!("Failed to replace existing '{}'", dst.display())
        })?;
    }

    std::fs::rename(&temp_path, dst).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            dst.display()
        )
    })?;

    Ok(())
}

/// Creates the config directory with user-only permissions.
fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    Ok(())
}

/// Terminal width from `$COLUMNS`, else 80.
fn terminal_width() -> u16 {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse().ok())
        .filter(|w| *w > 0)
        .unwrap_or(DEFAULT_WIDTH)
}

#[derive(Parser, Debug)]
#[command(
    name = "dayfeed",
    version,
    about = "Personal RSS reader with AI summaries and daily briefings"
)]
struct Args {
    /// Config file (default: ~/.config/dayfeed/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Subscription database (default: ~/.config/dayfeed/dayfeed.db)
    #[arg(long, value_name = "FILE", global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Manage subscriptions
    #[command(subcommand)]
    Feeds(FeedsCommand),
    /// Aggregate recent articles from every subscription
    Refresh {
        /// Layout width in columns (default: $COLUMNS or 80)
        #[arg(long)]
        width: Option<u16>,
    },
    /// Aggregate, then write a briefing of the top stories
    Briefing,
    /// Summarize an article
    Summarize {
        url: String,
        /// Text to summarize when the page cannot be fetched
        #[arg(long, value_name = "TEXT")]
        fallback: Option<String>,
    },
    /// Analyze a piece of text ("-" reads stdin)
    Analyze {
        text: String,
        /// Title used in the Markdown export
        #[arg(long)]
        title: Option<String>,
        /// Write the analysis as Markdown to FILE
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum FeedsCommand {
    /// List subscriptions
    List,
    /// Subscribe to a feed after checking that it loads
    Add { url: String },
    /// Remove a subscription by id
    Remove { id: String },
    /// Subscribe to several feeds at once
    Import {
        #[arg(required = true)]
        urls: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dayfeed=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    ensure_config_dir(&config_dir)?;

    let config_path = args
        .config
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(?config, "Loaded config");

    let db_path = args.db.unwrap_or_else(|| config_dir.join("dayfeed.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(StorageError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of dayfeed appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let app = Arc::new(
        App::from_config(config, Arc::new(SqlitePersistence::new(db)))
            .await
            .context("Failed to create application")?,
    );

    let signal_app = Arc::clone(&app);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            signal_app.shutdown();
        }
    });

    run(app, args.command).await
}

async fn run(app: Arc<App>, command: Command) -> Result<()> {
    let cancel = app.cancel_token();

    match command {
        Command::Serve => {
            let addr: SocketAddr = app
                .config()
                .listen_addr
                .parse()
                .with_context(|| format!("Invalid listen_addr '{}'", app.config().listen_addr))?;
            dayfeed::web::serve(app, addr)
                .await
                .context("Web server failed")?;
        }

        Command::Feeds(FeedsCommand::List) => {
            print!("{}", ui::render_subscriptions(&app.subscriptions().await));
        }

        Command::Feeds(FeedsCommand::Add { url }) => {
            let sub = app
                .subscribe(&url, &cancel)
                .await
                .with_context(|| format!("Failed to subscribe to {}", strip_control_chars(&url)))?;
            println!(
                "Subscribed to {} ({})",
                strip_control_chars(&sub.title),
                sub.id
            );
        }

        Command::Feeds(FeedsCommand::Remove { id }) => {
            match app.unsubscribe(&id).await.context("Failed to save subscriptions")? {
                Some(sub) => println!("Removed {}", strip_control_chars(&sub.title)),
                None => println!("No subscription with id {}", strip_control_chars(&id)),
            }
        }

        Command::Feeds(FeedsCommand::Import { urls }) => {
            let outcomes = app.import(&urls, &cancel).await;
            print!("{}", ui::render_import(&outcomes));
        }

        Command::Refresh { width } => {
            let report = app.refresh(&cancel).await;
            let width = width.unwrap_or_else(terminal_width);
            print!("{}", ui::render_grid(&report.articles, width));
            println!();
            print!(
                "{}",
                ui::render_refresh_outcomes(report.articles.len(), &report.outcomes)
            );
        }

        Command::Briefing => {
            let report = app.refresh(&cancel).await;
            tracing::debug!(articles = report.articles.len(), "Board refreshed for briefing");
            match app.daily_briefing(&cancel).await.context("Model request failed")? {
                Some(briefing) => {
                    print!(
                        "{}",
                        ui::render_briefing(&briefing, Local::now().date_naive())
                    )
                }
                None => println!("No recent articles to brief on."),
            }
        }

        Command::Summarize { url, fallback } => {
            let request = SummaryRequest {
                url: Some(url),
                content: fallback,
            };
            let summary = app
                .summarize(&request, &cancel)
                .await
                .context("Model request failed")?;
            print!("{}", ui::render_summary(&summary));
        }

        Command::Analyze {
            text,
            title,
            export,
        } => {
            let text = if text == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read stdin")?;
                buf
            } else {
                text
            };
            let title = title.unwrap_or_else(|| "Analysis".to_string());

            let analysis = app
                .analyze(&text, &cancel)
                .await
                .context("Model request failed")?;

            match export {
                Some(path) => {
                    atomic_write(&path, analysis.to_markdown(&title).as_bytes())?;
                    println!("Exported analysis to {}", path.display());
                }
                None => print!("{}", ui::render_analysis(&analysis, &title)),
            }
        }
    }

    Ok(())
}
