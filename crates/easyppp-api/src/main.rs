//! Easy PPP server
//!
//! ```bash
//! easyppp serve --config easyppp.toml
//! easyppp check-dataset data/countries_by_discount.json
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use easyppp_api::billing::{BillingProvider, RecordingBilling, StripeBilling};
use easyppp_api::config::Settings;
use easyppp_api::{build_router, AppState};
use easyppp_core::countries::{parse_dataset, DatasetGroup, DEFAULT_DATASET};
use easyppp_core::{InMemoryStore, Platform, TagCache};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "easyppp")]
#[command(version)]
#[command(about = "Easy PPP regional pricing server", long_about = None)]
struct Cli {
    /// TOML settings file
    #[arg(long, short, env = "EASYPPP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,
    /// Validate a country groups dataset
    CheckDataset {
        file: PathBuf,
    },
}

fn load_dataset(path: Option<&Path>) -> anyhow::Result<Vec<DatasetGroup>> {
    let groups = match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading dataset {}", path.display()))?;
            parse_dataset(&json)?
        }
        None => parse_dataset(DEFAULT_DATASET)?,
    };
    Ok(groups)
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    let cache = TagCache::new(settings.cache.max_capacity, settings.cache.ttl());
    let platform = Platform::new(
        Arc::new(InMemoryStore::new()),
        cache,
        settings.server.public_url.clone(),
    );

    let dataset = load_dataset(settings.data.country_groups_path.as_deref())?;
    let summary = platform.countries.import(&dataset).await?;
    tracing::info!(groups = summary.groups, countries = summary.countries, "country groups loaded");

    let billing: Arc<dyn BillingProvider> = if settings.billing.secret_key.is_empty() {
        tracing::warn!("billing.secret_key is empty; subscription cancellations are only recorded");
        Arc::new(RecordingBilling::new())
    } else {
        Arc::new(StripeBilling::new(
            settings.billing.api_base.clone(),
            settings.billing.secret_key.clone(),
        )?)
    };

    let bind = settings.server.bind.clone();
    let state = AppState::new(platform, settings, billing).context("invalid settings")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!("Easy PPP listening on {}", bind);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(settings).await,
        Commands::CheckDataset { file } => {
            let groups = load_dataset(Some(&file))?;
            let countries: usize = groups.iter().map(|g| g.countries.len()).sum();
            println!("{}: {} groups, {} countries", file.display(), groups.len(), countries);
            Ok(())
        }
    }
}
