// src/main.rs
use env_logger::{Builder, Env};
use investa::api;
use investa::auth::TokenService;
use investa::config::{Config, StoreBackend};
use investa::store::{MemoryStore, ScyllaStore, Store};
use log::{error, info, warn};
use std::sync::Arc;
use warp::Filter;

#[tokio::main]
async fn main() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // The Scylla session is opened by the first request that needs it.
    let store: Arc<dyn Store> = match config.store_backend {
        StoreBackend::Scylla => {
            info!("Using ScyllaDB at {}", config.scylla_nodes.join(", "));
            Arc::new(ScyllaStore::new(
                config.scylla_nodes.clone(),
                config.keyspace.clone(),
            ))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let tokens = Arc::new(TokenService::new(config.jwt_secret.clone()));

    let routes = api::routes(store, tokens)
        .with(api::cors(&config.cors_origins))
        .with(warp::log("investa::api"));

    info!("Server running on http://{}", config.addr);
    warp::serve(routes).run(config.addr).await;
}
