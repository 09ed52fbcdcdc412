use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use amae_dashboard::{create_router, DashboardState};
use notification_cell::LogChannel;
use shared_config::AppConfig;
use shared_models::clock::SystemClock;
use sync_cell::SyncPoller;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Amae consultation dashboard");

    let config = AppConfig::from_env();
    if !config.is_configured() {
        warn!("Clinic session is not fully configured; backend calls will be rejected");
    }
    let port = config.dashboard_port;

    let state = Arc::new(
        DashboardState::build(config, Arc::new(SystemClock), Arc::new(LogChannel))
            .map_err(|e| anyhow::anyhow!("invalid session configuration: {}", e))?,
    );

    // Pollers fire once right away, then on their intervals
    let poller = SyncPoller::start(Arc::clone(&state.client));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Shutting down, stopping sync pollers");
    poller.stop().await;

    Ok(())
}
