pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod discussions;
pub mod error;
pub mod events;
pub mod messaging;
pub mod models;
pub mod quotes;
pub mod routes;
pub mod scheduling;
pub mod schema;
pub mod state;
pub mod store;
pub mod utils;

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
