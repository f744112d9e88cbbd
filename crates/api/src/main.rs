//! API server entry point.

use api::config::Config;
use inventory::SweeperConfig;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Build application state and seed demo data
    let (state, mut events) = api::create_default_state(&config);
    api::seed_demo_products(&state).await;

    // 3. Background tasks: stale-reservation sweep and event drain
    let sweeper = inventory::sweeper::spawn(
        state.engine.clone(),
        SweeperConfig {
            interval: config.sweep_interval,
            reservation_ttl: chrono::Duration::from_std(config.reservation_ttl)
                .unwrap_or_else(|_| chrono::Duration::minutes(15)),
        },
    );
    let drain = tokio::spawn(async move {
        // Stand-in for the notification consumer: log each terminal outcome.
        while let Some(event) = events.recv().await {
            tracing::info!(
                event_type = event.event_type(),
                order_id = %event.order_id(),
                "order event"
            );
        }
    });

    // 4. Start server
    let app = api::create_app(state);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    sweeper.abort();
    drain.abort();
    tracing::info!("server shut down gracefully");
}
