//! FrameMacros explain server
//!
//! Serves the rewriting engine over HTTP: a call and a table name go in,
//! the bound pipeline summary comes out.

use anyhow::Context;
use framemacros_rewrite::Rewriter;
use tracing::info;

mod catalog;
mod config;
mod explain;
mod logging;
mod routes;

use catalog::Catalog;
use config::Config;
use routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = Config::path_from_env();
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path))?;

    logging::init(&config.logging)?;

    let catalog = Catalog::new(config.tables.clone());
    info!(config = %config_path, tables = catalog.len(), "Loaded table catalog");

    let app = routes::router(AppState::new(Rewriter::default(), catalog));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;
    info!("Starting FrameMacros explain server on {}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
