use clap::{Parser, Subcommand};
use pixel_depot::imaging::codec::HEIC_CONTENT_TYPE;
use pixel_depot::imaging::mime_type_for_filename;
use pixel_depot::persistence::{self, JsonLinesRepository, Upload};
use pixel_depot::storage::ShardLayout;
use pixel_depot::{config, output, pipeline};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "pixel-depot")]
#[command(about = "Store uploaded images as sized variants in a sharded directory tree")]
#[command(long_about = "\
Store uploaded images as sized variants in a sharded directory tree

Every upload is decoded once. A thumbnail is always produced; further
variants come from the operations in --meta. Either every variant is
written or none is.

Stored layout (shard length 2):

  files/
  └── 3f/
      ├── 3f2a9c0e1b7d4e55@thumb.jpg       # {id}@{suffix}.{ext}
      ├── 3f2a9c0e1b7d4e55@original.jpg
      └── 3fd1...e0.jpg                    # obfuscated: random name, no suffix

Example --meta:

  {\"title\": \"Beach\", \"tags\": [\"sea\"], \"operations\": [
    {\"suffix\": \"large\", \"resizeOp\": \"scale\", \"longestSide\": 1600},
    {\"suffix\": \"web\", \"resizeOp\": \"scalebywidth\", \"longestSide\": 800, \"compressTo\": \"png\"}
  ]}

Run 'pixel-depot gen-config' to generate a documented depot.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means defaults)
    #[arg(short, long, default_value = "depot.toml", global = true)]
    config: PathBuf,

    /// trace, debug, info, warn or error (RUST_LOG takes precedence)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode an image and store all its variants
    Ingest {
        /// Image file to ingest
        file: PathBuf,

        /// MIME type of the upload (guessed from the extension if omitted)
        #[arg(long)]
        content_type: Option<String>,

        /// Upload metadata as JSON: title, tags, operations
        #[arg(long, default_value = "")]
        meta: String,

        /// Append a record of the upload to this JSON-lines file
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Author recorded in the catalog
        #[arg(long, default_value = "")]
        author: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete stored variants by filename
    Remove {
        #[arg(required = true)]
        filenames: Vec<String>,
    },
    /// Print where a stored variant lives and how to serve it
    Locate { filename: String },
    /// Print a stock depot.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Ingest {
            file,
            content_type,
            meta,
            catalog,
            author,
            json,
        } => {
            let store = config::load_config(&cli.config)?;
            let layout = ShardLayout::from_config(&store);
            init_thread_pool(&store.processing);
            let bytes = std::fs::read(&file)?;
            let content_type = content_type.unwrap_or_else(|| guess_content_type(&file));
            let original_filename = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let meta = persistence::parse_upload_meta(&meta);

            let result = match catalog {
                Some(path) => {
                    let upload = Upload {
                        bytes: &bytes,
                        content_type: &content_type,
                        original_filename: &original_filename,
                        author_id: &author,
                    };
                    persistence::ingest(&JsonLinesRepository::new(path), upload, &meta, &store)?.result
                }
                None => pipeline::process_upload(
                    &bytes,
                    &content_type,
                    &original_filename,
                    &meta.operations,
                    &store,
                )?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for line in output::format_ingest_output(&result, &layout) {
                    println!("{}", line);
                }
            }
        }
        Command::Remove { filenames } => {
            let layout = load_layout(&cli.config)?;
            let mut removed = Vec::new();
            let mut failed = Vec::new();
            for filename in filenames {
                match layout.delete_variant(&filename) {
                    Ok(()) => removed.push(filename),
                    Err(e) => failed.push((filename, e.to_string())),
                }
            }
            for line in output::format_remove_output(&removed, &failed) {
                println!("{}", line);
            }
            if !failed.is_empty() {
                return Err(format!("{} file(s) could not be removed", failed.len()).into());
            }
        }
        Command::Locate { filename } => {
            let layout = load_layout(&cli.config)?;
            let path = layout.locate(&filename)?;
            if !path.is_file() {
                return Err(format!("{} not found", path.display()).into());
            }
            for line in output::format_locate_output(&path, &filename) {
                println!("{}", line);
            }
        }
    }

    Ok(())
}

fn load_layout(path: &Path) -> Result<ShardLayout, config::ConfigError> {
    Ok(ShardLayout::from_config(&config::load_config(path)?))
}

/// Install the global subscriber. Logs go to stderr so `--json` output stays clean.
fn init_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => log_level.to_lowercase(),
        _ => "info".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Content type from the file extension. HEIC is recognised here even though
/// it is not a storable format.
fn guess_content_type(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "heic" | "heif" => HEIC_CONTENT_TYPE.to_string(),
        _ => mime_type_for_filename(&path.to_string_lossy()).to_string(),
    }
}
