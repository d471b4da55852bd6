use clap::{Parser, Subcommand};
use log::{debug, error, info};
use serde::Serialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pcapvault::configuration::{Config, ConfigOverrides};
use pcapvault::error_handling::types::IngestError;
use pcapvault::ingestion::{check_extension, stage_copy, validate_upload, Ingestor, Upload};
use pcapvault::storage::{AnalysisStore, DatabaseStorage, FolderOrder, PageRequest};

#[derive(Parser)]
#[command(name = "pcapvault")]
#[command(version)]
#[command(about = "Stores packet captures and keeps a traffic summary of each one")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Move a capture into storage, analyze it and record the result
    Ingest {
        file: PathBuf,
        /// Name to record instead of the file's own name
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        uploader_id: Option<i64>,
        /// Ingest a staged copy and leave FILE where it is
        #[arg(long)]
        keep_source: bool,
    },
    /// Analyze a capture in place without storing anything
    Analyze { file: PathBuf },
    /// Show the stored analysis of a SHA-256 fingerprint
    Show { sha256: String },
    /// List stored captures, newest first
    List {
        #[arg(long)]
        limit: Option<u64>,
        /// Only return records with an id below this one
        #[arg(long)]
        cursor: Option<i32>,
    },
    /// List storage folders by creation time
    Folders {
        #[arg(long, default_value_t = FolderOrder::Desc)]
        order: FolderOrder,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Show the most recently created storage folder
    Latest,
    /// Show the oldest storage folder
    Oldest,
    /// Print the path of the file kept in a storage folder
    Locate { folder: String },
}

type CliResult = Result<(), Box<dyn Error>>;

fn load_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Importing configuration from {}", path.display());
            Config::from_file(path)?
        }
        None => Config::default(),
    };
    config.apply_overrides(&args.overrides);
    config.validate()?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn display_name(file: &Path, name: Option<String>) -> String {
    name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    })
}

async fn ingest(
    ingestor: &Ingestor<DatabaseStorage>,
    config: &Config,
    file: PathBuf,
    name: Option<String>,
    uploader_id: Option<i64>,
    keep_source: bool,
) -> CliResult {
    let original_name = display_name(&file, name);
    let path = if keep_source {
        check_extension(&original_name).map_err(IngestError::from)?;
        let size = tokio::fs::metadata(&file)
            .await
            .map_err(|e| IngestError::io(&file, e))?
            .len();
        validate_upload(&original_name, size, config.max_upload_bytes())
            .map_err(IngestError::from)?;
        let staging_dir = config.staging_dir.clone();
        let source = file.clone();
        let name = original_name.clone();
        tokio::task::spawn_blocking(move || stage_copy(&source, &staging_dir, &name))
            .await?
            .map_err(|e| IngestError::io(&file, e))?
    } else {
        file
    };

    let upload = Upload {
        path: path.clone(),
        original_name,
        uploaded_by_id: uploader_id,
    };
    match ingestor.ingest(upload).await {
        Ok(ingested) => print_json(&ingested),
        Err(e) => {
            if keep_source && tokio::fs::remove_file(&path).await.is_ok() {
                debug!("Removed staged copy {}", path.display());
            }
            Err(e.into())
        }
    }
}

async fn run(args: Args) -> CliResult {
    let config = load_config(&args)?;
    let store = Arc::new(DatabaseStorage::open(&config.database_path).await?);
    let ingestor = Ingestor::from_config(&config, Arc::clone(&store))?;

    match args.command {
        Command::Ingest {
            file,
            name,
            uploader_id,
            keep_source,
        } => ingest(&ingestor, &config, file, name, uploader_id, keep_source).await,
        Command::Analyze { file } => {
            let name = display_name(&file, None);
            print_json(&ingestor.analyze_file(&file, &name).await?)
        }
        Command::Show { sha256 } => match store.find_by_sha256(&sha256).await? {
            Some(record) => print_json(&record),
            None => Err(IngestError::RecordNotFound(sha256).into()),
        },
        Command::List { limit, cursor } => {
            print_json(&store.list_pcaps(PageRequest { limit, cursor }).await?)
        }
        Command::Folders { order, limit } => print_json(&store.list_folders(order, limit).await?),
        Command::Latest => match store.latest_folder().await? {
            Some(listing) => print_json(&listing),
            None => Err(IngestError::RecordNotFound("latest folder".to_string()).into()),
        },
        Command::Oldest => match store.oldest_folder().await? {
            Some(listing) => print_json(&listing),
            None => Err(IngestError::RecordNotFound("oldest folder".to_string()).into()),
        },
        Command::Locate { folder } => {
            let path = ingestor.locate_stored_file(&folder).await?;
            print_json(&serde_json::json!({ "folder": folder, "path": path }))
        }
    }
}

#[tokio::main]
async fn main() {
    // RUST_LOG overrides the default level
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_target(false)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        match e.downcast_ref::<IngestError>() {
            Some(ingest_error) => error!("[{}] {}", ingest_error.code(), ingest_error),
            None => error!("{}", e),
        }
        std::process::exit(1);
    }
}
