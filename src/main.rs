use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use catalogx_api::RestApi;
use catalogx_core::SimilarityConfig;
use catalogx_similarity::Catalog;
use catalogx_storage::StorageManager;

/// Product catalog with feedback-driven recommendations
#[derive(Parser, Debug)]
#[command(name = "catalogx")]
#[command(about = "A product catalog with click-feedback recommendations", long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Keep everything in memory (nothing is persisted)
    #[arg(long, global = true)]
    in_memory: bool,

    /// Log level
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(flatten)]
    similarity: SimilarityArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Debug)]
struct SimilarityArgs {
    /// Score given to newly seeded product pairs
    #[arg(long, default_value_t = 0.5, global = true)]
    default_score: f64,

    /// Score added to the clicked recommendation
    #[arg(long, default_value_t = 0.1, global = true)]
    increment_step: f64,

    /// Score removed from each recommendation shown but not clicked
    #[arg(long, default_value_t = 0.05, global = true)]
    decrement_step: f64,

    /// Recommendations returned with a product detail
    #[arg(long, default_value_t = 3, global = true)]
    recommendations: usize,
}

impl From<&SimilarityArgs> for SimilarityConfig {
    fn from(args: &SimilarityArgs) -> Self {
        Self {
            default_score: args.default_score,
            increment_step: args.increment_step,
            decrement_step: args.decrement_step,
            recommendation_limit: args.recommendations,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// HTTP API port
        #[arg(long, default_value_t = 8000)]
        http_port: u16,
    },
    /// Seed a similarity record for every product pair that lacks one
    InitSimilarities,
    /// Add a product category
    AddCategory { name: String },
    /// Add a product tag
    AddTag { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let storage = if cli.in_memory {
        StorageManager::in_memory()
    } else {
        info!("Data directory: {:?}", cli.data_dir);
        StorageManager::new(&cli.data_dir)?
    };
    let catalog = Arc::new(Catalog::new(
        Arc::new(storage),
        SimilarityConfig::from(&cli.similarity),
    )?);

    match cli.command.unwrap_or(Command::Serve { http_port: 8000 }) {
        Command::Serve { http_port } => serve(catalog, http_port).await?,
        Command::InitSimilarities => {
            let report = catalog.initialize_similarities()?;
            println!(
                "Processed {} pairs. Created {} new similarities.",
                report.total_pairs, report.created
            );
            if report.failed > 0 {
                anyhow::bail!("{} pairs could not be seeded", report.failed);
            }
        }
        Command::AddCategory { name } => {
            let category = catalog.create_category(&name)?;
            println!("Created category {} ({})", category.name, category.id);
        }
        Command::AddTag { name } => {
            let tag = catalog.create_tag(&name)?;
            println!("Created tag {} ({})", tag.name, tag.id);
        }
    }

    Ok(())
}

async fn serve(catalog: Arc<Catalog<StorageManager>>, http_port: u16) -> anyhow::Result<()> {
    info!("Starting catalogx v{}", env!("CARGO_PKG_VERSION"));

    let http_handle = std::thread::spawn(move || {
        let sys = actix_web::rt::System::new();
        sys.block_on(async {
            if let Err(e) = RestApi::start(catalog, http_port).await {
                tracing::error!("HTTP server error: {}", e);
            }
        })
    });

    info!("HTTP API: http://localhost:{}/", http_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = tokio::task::spawn_blocking(move || {
            http_handle.join().ok();
        }) => {
            info!("HTTP server stopped");
        }
    }

    info!("Shutting down...");
    Ok(())
}
