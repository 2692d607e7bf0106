//! Harbor CLI: drive uploads, variant generation and serving resolution
//! against the configured storage backend and database.
//!
//! Reads the same environment as the service (see `.env`). `ls` only needs
//! storage; every other command also needs DATABASE_URL.

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use harbor_cli::{init_tracing, print_json, ServedReport};
use harbor_core::{AppError, Config, ErrorMetadata, FileRecordStore};
use harbor_db::{setup_database, FileRecordRepository};
use harbor_services::{
    create_storage, HarborService, ServeKind, ServingTarget, Storage, UploadDestination,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "harbor", about = "Harbor image variant pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an original into a collection and generate its variants
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Collection UUID
        #[arg(long)]
        collection: Uuid,
        /// Store the original only
        #[arg(long)]
        skip_variants: bool,
    },
    /// (Re)generate variants for files
    Variants {
        /// File UUIDs
        ids: Vec<Uuid>,
        /// Every file of this collection
        #[arg(long)]
        collection: Option<Uuid>,
    },
    /// Resolve how a file kind would be served
    Resolve {
        /// File UUID
        id: Uuid,
        /// thumbnail, medium or original
        #[arg(long, default_value = "thumbnail")]
        kind: ServeKind,
        /// Write streamed bytes here
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List stored objects under a prefix
    Ls {
        /// Key prefix, e.g. a collection id followed by '/'
        #[arg(default_value = "")]
        prefix: String,
        /// Maximum number of keys
        #[arg(long, default_value = "100")]
        limit: usize,
    },
}

async fn connect(config: &Config) -> anyhow::Result<(HarborService, FileRecordRepository)> {
    let pool = setup_database(config).await?;
    let repository = FileRecordRepository::new(pool);
    let service = HarborService::from_config(config, Arc::new(repository.clone()))
        .await
        .context("Failed to initialize storage")?;
    Ok((service, repository))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        if let Some(app_error) = err.downcast_ref::<AppError>() {
            tracing::debug!(details = %app_error.detailed_message(), "Command failed");
            anyhow::bail!(
                "{} ({}): {}",
                app_error.error_code(),
                app_error.http_status_code(),
                app_error.client_message()
            );
        }
        return Err(err);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Upload {
            file,
            collection,
            skip_variants,
        } => {
            let (service, _) = connect(&config).await?;
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("File path has no usable file name")?
                .to_string();
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let record = service
                .upload_file(
                    Bytes::from(data),
                    &filename,
                    &UploadDestination::collection(collection),
                )
                .await?;

            if skip_variants {
                print_json(&record)?;
            } else {
                let summary = service.spawn_variant_generation(vec![record.id]).await?;
                print_json(&serde_json::json!({ "file": record, "variants": summary }))?;
            }
        }
        Commands::Variants { ids, collection } => {
            let (service, repository) = connect(&config).await?;
            let mut ids = ids;
            if let Some(collection_id) = collection {
                let records = repository.list_by_collection(collection_id).await?;
                ids.extend(records.into_iter().map(|r| r.id));
            }
            if ids.is_empty() {
                anyhow::bail!("Pass file ids or --collection");
            }

            let summary = service.enqueue_variant_generation(&ids).await;
            print_json(&summary)?;
        }
        Commands::Resolve { id, kind, output } => {
            let (service, repository) = connect(&config).await?;
            if repository.get_file_record(id).await?.is_none() {
                anyhow::bail!("File {} not found", id);
            }

            let served = service.resolve_serving_url(id, kind).await?;
            print_json(&ServedReport::from(&served))?;

            if let (Some(path), ServingTarget::Stream { body, .. }) = (output, served.target) {
                let mut file = tokio::fs::File::create(&path)
                    .await
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                let mut body = body;
                while let Some(chunk) = body.try_next().await? {
                    file.write_all(&chunk).await?;
                }
                file.flush().await?;
                tracing::info!(path = %path.display(), "Wrote served bytes");
            }
        }
        Commands::Ls { prefix, limit } => {
            let storage = create_storage(&config).await?;
            let objects: Vec<_> = storage.list(&prefix, limit).try_collect().await?;
            print_json(&objects)?;
        }
    }

    Ok(())
}
