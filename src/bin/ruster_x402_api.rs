//! Ruster x402 API Server
//!
//! Pay-per-call security analysis API (x402 payment gate in front of every
//! analysis route)
//!
//! Usage:
//!   cargo run --bin ruster_x402_api
//!
//! Environment:
//!   PORT / HOST         - Server address (default: 0.0.0.0:8080)
//!   METRICS_PORT        - Prometheus listener (default: 9090)
//!   RECEIVER_ADDRESS    - Payment receiver
//!   X402_ENFORCE_EXPIRY - Reject expired payment tokens (default: false)
//!   RUST_LOG            - Log filter (default: info)

use ruster_x402::api::{create_metrics_router, create_router, AppState};
use ruster_x402::utils::constants::{APP_VERSION, ROUTE_PRICES};
use ruster_x402::{Providers, ServiceConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    print_banner();

    let config = ServiceConfig::from_env();
    let providers = Providers::http(&config.upstream)?;

    let state = Arc::new(AppState::new(config.clone(), &providers));
    let metrics = state.metrics.clone();

    // Background cache sweepers
    let sweepers = [
        state.caches.contract.spawn_sweeper(config.cache_sweep_interval),
        state.caches.token.spawn_sweeper(config.cache_sweep_interval),
    ];
    info!("🧹 Cache sweepers started (every {}s)", config.cache_sweep_interval.as_secs());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let metrics_addr: SocketAddr = format!("{}:{}", config.host, config.metrics_port).parse()?;

    info!("🚀 Ruster x402 API starting on http://{}", addr);
    info!("📈 Prometheus metrics on http://{}/metrics", metrics_addr);
    info!("");
    info!("Paid endpoints:");
    for route in ROUTE_PRICES.iter() {
        info!("  {:<24} {:>6} USDC  - {}", route.path, route.price, route.description);
    }
    info!("");
    info!("Press Ctrl+C for graceful shutdown");
    info!("");

    let listener = TcpListener::bind(addr).await?;
    let metrics_listener = TcpListener::bind(metrics_addr).await?;

    // One Ctrl+C stops both listeners
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let metrics_server = {
        let mut rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let result = axum::serve(metrics_listener, create_metrics_router(metrics))
                .with_graceful_shutdown(async move {
                    let _ = rx.wait_for(|stop| *stop).await;
                })
                .await;
            if let Err(e) = result {
                warn!("⚠️ Metrics listener stopped: {}", e);
            }
        })
    };

    let mut rx = shutdown_rx;
    axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(async move {
            let _ = rx.wait_for(|stop| *stop).await;
        })
        .await?;

    // Graceful shutdown sequence
    info!("");
    info!("🛑 Shutdown signal received, cleaning up...");
    for sweeper in sweepers {
        sweeper.abort();
    }
    let _ = metrics_server.await;

    let summary = state.metrics.snapshot();
    info!("📊 Final summary:");
    info!("   Requests served: {}", summary.total_requests);
    info!("   Paid calls: {}", summary.total_payments);
    info!("   Revenue: {} USDC", summary.total_revenue);
    info!("   Uptime: {}s", state.uptime_seconds());

    info!("👋 Ruster x402 API shutdown complete");

    Ok(())
}

fn print_banner() {
    println!(
        r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║                 R U S T E R   x 4 0 2                        ║
    ║                                                              ║
    ║         Pay-per-call Security Analysis API v{:<8}         ║
    ║        gas · tokens · wallets · MEV · prompts · agents       ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#,
        APP_VERSION
    );
}
