use broker::RedisBridge;
use events::EventDispatcher;
use log::*;
use service::config::{Config, RelayMode};
use service::logging::Logger;
use sse::{LocalDispatcher, Manager};
use std::error::Error as StdError;
use std::sync::Arc;
use tokio::net::TcpListener;
use web::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn StdError + Send + Sync>> {
    let config = Config::new();
    Logger::init_logger(&config)?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {e}");
        return Err(e.into());
    }

    info!(
        "Starting relay in {} mode ({} environment, heartbeat every {}s)",
        config.relay_mode,
        config.runtime_env(),
        config.heartbeat_interval_secs
    );

    let sse_manager = Arc::new(Manager::new(config.heartbeat_interval()));

    let (dispatcher, bridge): (Arc<dyn EventDispatcher>, Option<RedisBridge>) =
        match config.relay_mode {
            RelayMode::Local => (
                Arc::new(LocalDispatcher::new(Arc::clone(&sse_manager))),
                None,
            ),
            RelayMode::Broker => {
                let bridge = RedisBridge::connect(
                    &config.redis_url,
                    &config.broker_channel,
                    Arc::clone(&sse_manager),
                )
                .await?;
                (Arc::new(bridge.publisher()), Some(bridge))
            }
        };

    let listen_address = config.listen_address();
    let shutdown_manager = Arc::clone(&sse_manager);
    let app_state = AppState::new(config, sse_manager, dispatcher);

    let listener = bind(&listen_address).await?;
    info!("Listening on http://{listen_address}");

    axum::serve(listener, router::define_routes(app_state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open event streams never complete on their own
            let closed = shutdown_manager.disconnect_all();
            info!("Closed {closed} event stream(s)");
        })
        .await?;

    if let Some(bridge) = bridge {
        bridge.shutdown();
    }
    info!("Server closed");

    Ok(())
}

async fn bind(listen_address: &str) -> std::io::Result<TcpListener> {
    TcpListener::bind(listen_address).await.map_err(|e| {
        error!("Failed to bind {listen_address}: {e}");
        e
    })
}

/// Completes on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => info!("SIGTERM received, initiating graceful shutdown"),
    }
}
