use log::{error, info, warn};
use service::{config::Config, logging::Logger};
use sse::bus::{Bus, MemoryBus, RedisBus};
use sse::{Broker, BrokerConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting shiftboard real-time service [{}]...",
        config.runtime_env()
    );

    let bus = match init_bus(&config) {
        Ok(bus) => bus,
        Err(e) => {
            error!("Failed to configure the event bus: {e}");
            std::process::exit(1);
        }
    };

    let broker = Broker::new(
        bus,
        BrokerConfig {
            channel: config.bus_channel().to_string(),
            client_capacity: config.client_buffer_capacity,
        },
    )
    .await;
    let broker = Arc::new(broker);

    let app_state = web::AppState::new(config, Arc::clone(&broker));

    if let Err(e) = web::init_server(app_state).await {
        error!("Server error: {e}");
        broker.close().await;
        std::process::exit(1);
    }

    // Normally already closed by the shutdown signal handler; closing is idempotent.
    broker.close().await;
    info!("Shut down cleanly");
}

fn init_bus(config: &Config) -> Result<Arc<dyn Bus>, String> {
    match config.redis_url() {
        Some(url) => {
            let bus = RedisBus::new(url).map_err(|e| e.to_string())?;
            Ok(Arc::new(bus))
        }
        None if config.is_production() => {
            Err("REDIS_URL must be set in production: instances would not share events".to_string())
        }
        None => {
            warn!("No REDIS_URL configured, events are only delivered within this process");
            Ok(Arc::new(MemoryBus::new()))
        }
    }
}
