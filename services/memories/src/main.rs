use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memories_service::{
    BackendClient, Config, ImageAcquisition, ImageTransform, MemoryDraft, MemoryFeed,
    MemoryRepository, PathLibrary, StorageClient, StoredMemory, UploadOrchestrator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Capture photo memories and list them back
#[derive(Debug, Parser)]
#[command(name = "memories", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload a photo and save it as a new memory
    Create {
        /// Memory title
        #[arg(long)]
        title: String,
        /// Optional description
        #[arg(long, default_value = "")]
        description: String,
        /// Photo to upload
        #[arg(long)]
        image: PathBuf,
    },
    /// List stored memories, newest first
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level, &config.service.log_format)?;

    info!(service = %config.service.name, "Starting memories client");

    // Shared backend client, handed to both data-access components
    let backend = Arc::new(
        BackendClient::new(&config.backend).context("Failed to initialize backend client")?,
    );
    let storage = Arc::new(StorageClient::new(backend.clone(), &config.storage));
    let repository = Arc::new(MemoryRepository::new(backend, &config.database));

    match cli.command {
        Command::Create {
            title,
            description,
            image,
        } => {
            let mut acquisition = ImageAcquisition::new(
                PathLibrary::new(Some(image)),
                ImageTransform::new(&config.image),
            );
            let image_uri = acquisition
                .pick_image()
                .await
                .context("Failed to prepare image")?;

            let orchestrator = UploadOrchestrator::new(storage, repository);
            let created = orchestrator
                .upload(MemoryDraft {
                    title,
                    description,
                    image_uri,
                })
                .await;

            match created {
                Ok(memory) => print_memory(&memory),
                Err(err) => {
                    let message = orchestrator
                        .error_message()
                        .unwrap_or_else(|| err.to_string());
                    anyhow::bail!(message);
                }
            }
        }
        Command::List { json } => {
            let mut feed = MemoryFeed::new(repository);
            let memories = feed.refresh().await.context("Failed to list memories")?;

            if json {
                println!("{}", serde_json::to_string_pretty(memories)?);
            } else if memories.is_empty() {
                println!("No memories yet");
            } else {
                for memory in memories {
                    print_memory(memory);
                }
            }
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .context("Invalid log level")?;

    let registry = tracing_subscriber::registry().with(env_filter);

    // Logs go to stderr so command output stays pipeable
    if log_format == "json" {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn print_memory(memory: &StoredMemory) {
    println!(
        "{}  {}  {}",
        memory.created_at.format("%Y-%m-%d %H:%M"),
        memory.id,
        memory.title
    );
    if let Some(description) = memory.description.as_deref().filter(|d| !d.is_empty()) {
        println!("    {description}");
    }
    if let Some(url) = &memory.image_url {
        println!("    {url}");
    }
}
