use reportify::config::Config;
use reportify::services::{issue_service::IssueService, summary_service::SummaryService};
use reportify::store::LedgerStore;
use reportify::{AppState, create_app};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reportify=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        "Configuration loaded (thresholds {}/{}, storage {:?})",
        config.ledger.upvote_threshold,
        config.ledger.downvote_threshold,
        config.storage_backend
    );

    // Persistence
    let store = LedgerStore::from_config(&config).await?;

    // Summarizer is optional
    let summarizer = match &config.summarizer {
        Some(summarizer_config) => Some(Arc::new(SummaryService::new(summarizer_config)?)),
        None => {
            tracing::warn!("SUMMARIZER_API_URL or SUMMARIZER_API_KEY not set, summaries disabled");
            None
        }
    };

    let issues = IssueService::load(config.ledger, store, summarizer).await;

    // Create application state
    let state = AppState {
        issues: issues.clone(),
        config: Arc::new(config.clone()),
    };

    // Create application
    let app = create_app(state);

    // Create listener
    let listener = TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!("Server listening on {}:{}", config.host, config.port);

    // Start server
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    issues.dispose().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
