use std::sync::Arc;

use anyhow::Context;
use tokio::{net::TcpListener, signal};

use backoffice::{
    auth::jwt::JwtService,
    config::AppConfig,
    db,
    discussions::watcher::spawn_board_watcher,
    init_tracing, messaging, routes,
    state::AppState,
    store::{PgStore, Store},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        messaging_configured = config.whatsapp.is_configured(),
        "loaded backoffice configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    if applied > 0 {
        tracing::info!(applied, "database migrations applied");
    }

    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));
    let gateway = messaging::gateway_from_config(&config.whatsapp)
        .context("failed to build messaging gateway")?;
    let jwt = JwtService::from_config(&config);
    let address = format!("{}:{}", config.server_host, config.server_port);

    let state = AppState::new(store.clone(), config, gateway, jwt);
    if let Err(err) = state.board.reload(store.as_ref()).await {
        tracing::warn!(error = %err, "initial discussion load failed");
    }
    let watcher = spawn_board_watcher(state.board.clone(), store, &state.events);

    let app = routes::create_router(state);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(%address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            tracing::info!("server received shutdown signal");
        })
        .await
        .context("server error")?;

    watcher.abort();
    Ok(())
}
