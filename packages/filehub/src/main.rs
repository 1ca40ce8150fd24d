use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use filehub::config::AppConfig;
use filehub::models::FileFilter;
use filehub::{FileHub, UploadRequest};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "filehub", version, about = "Deduplicating file store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a file
    Upload {
        path: PathBuf,
        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// List files, newest first
    List {
        #[arg(long)]
        name_contains: Option<String>,
        #[arg(long)]
        content_type: Option<String>,
        #[arg(long)]
        min_size: Option<u64>,
        #[arg(long)]
        max_size: Option<u64>,
        /// First upload day, YYYY-MM-DD (UTC)
        #[arg(long)]
        start_date: Option<NaiveDate>,
        /// Last upload day, YYYY-MM-DD (UTC)
        #[arg(long)]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        extension: Option<String>,
    },
    /// Show one file
    Get { id: Uuid },
    /// Write a file's content to stdout or a path
    Cat {
        id: Uuid,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete a file, reclaiming its content when unshared
    Delete { id: Uuid },
    /// Storage totals and deduplication savings
    Stats,
    /// Reclaim unreferenced content and stale staged uploads
    Sweep {
        /// Only staged uploads older than this are removed
        #[arg(long, default_value_t = 3600)]
        staging_min_age_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load config")?;

    let level = config.log.max_level().context("Invalid log config")?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let hub = FileHub::open(&config)
        .await
        .context("Failed to open file hub")?;

    match cli.command {
        Command::Upload {
            path,
            name,
            content_type,
        } => {
            let name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("Path has no file name; pass --name")?,
            };
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let size = file.metadata().await?.len();

            let mut request = UploadRequest::new(name).declared_size(size);
            if let Some(content_type) = content_type {
                request = request.content_type(content_type);
            }
            print_json(&hub.upload(Box::new(file), request).await?)?;
        }
        Command::List {
            name_contains,
            content_type,
            min_size,
            max_size,
            start_date,
            end_date,
            extension,
        } => {
            let filter = FileFilter {
                name_contains,
                content_type_exact: content_type,
                min_size,
                max_size,
                start_date,
                end_date,
                extension,
            };
            print_json(&hub.list(&filter).await?)?;
        }
        Command::Get { id } => print_json(&hub.get(id).await?)?,
        Command::Cat { id, output } => {
            let (file, mut reader) = hub.open_content(id).await?;
            let written = match output {
                Some(path) => {
                    let mut out = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    tokio::io::copy(&mut reader, &mut out).await?
                }
                None => tokio::io::copy(&mut reader, &mut tokio::io::stdout()).await?,
            };
            info!(id = %file.id, bytes = written, "Wrote file content");
        }
        Command::Delete { id } => print_json(&hub.delete(id).await?)?,
        Command::Stats => print_json(&hub.stats().await?)?,
        Command::Sweep {
            staging_min_age_secs,
        } => {
            let summary = hub
                .reclaim_orphans(Duration::from_secs(staging_min_age_secs))
                .await?;
            print_json(&summary)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
