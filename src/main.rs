use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use harkai_notifier::config::Settings;
use harkai_notifier::server::{create_app, AppState};
use harkai_notifier::telemetry::init_telemetry;
use harkai_notifier::triggers::RedisSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing (keep the guard alive until exit)
    let _telemetry = init_telemetry(&settings.otel)?;
    tracing::info!(
        transport = %settings.transport.backend,
        directory = %settings.directory.backend,
        "Configuration loaded"
    );

    // Create application state
    let state = AppState::new(settings.clone());
    tracing::info!("Application state initialized");

    // Redis subscriber (optional); its shutdown sender doubles as the process-wide signal
    let subscriber = settings
        .redis
        .subscriber_enabled
        .then(|| RedisSubscriber::new(settings.redis.clone(), state.dispatcher.clone()));
    let shutdown_tx = match subscriber {
        Some(ref subscriber) => subscriber.shutdown_signal(),
        None => {
            tracing::info!("Redis subscriber disabled");
            broadcast::channel::<()>(1).0
        }
    };

    // Start Redis subscriber in background
    let redis_handle = subscriber.map(|subscriber| {
        tokio::spawn(async move {
            if let Err(e) = subscriber.start().await {
                tracing::error!(error = %e, "Redis subscriber failed");
            }
        })
    });

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(shutdown_tx))
        .await?;

    if let Some(handle) = redis_handle {
        tracing::info!("Waiting for Redis subscriber to finish...");
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    let _ = shutdown_tx.send(());
}
