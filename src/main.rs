use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, RestConfig};
use carebook_core::config::{data_file_from_env_value, page_size_from_env_value};
use carebook_core::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use carebook_core::{CoreConfig, CoreServices, LocalDatabase, RolePolicy};

/// Main entry point for the Carebook server
///
/// Resolves configuration once, opens the store and serves the REST API.
///
/// # Environment Variables
/// - `CAREBOOK_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CAREBOOK_DATA_FILE`: SQLite data file; unset keeps everything in memory
/// - `CAREBOOK_DEFAULT_PAGE_SIZE`: page size when a request gives none (default: 20)
/// - `CAREBOOK_MAX_PAGE_SIZE`: largest page size a request may ask for (default: 100)
/// - `JWT_SECRET`: HS256 secret for bearer tokens (required)
///
/// # Errors
/// Returns an error if configuration is invalid, the data file cannot be loaded,
/// or the server fails to bind or run.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("carebook=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_cfg = RestConfig::from_env_values(
        std::env::var("CAREBOOK_REST_ADDR").ok(),
        std::env::var("JWT_SECRET").ok(),
    )?;

    let data_file = data_file_from_env_value(std::env::var("CAREBOOK_DATA_FILE").ok());
    let default_page_size = page_size_from_env_value(
        std::env::var("CAREBOOK_DEFAULT_PAGE_SIZE").ok(),
        DEFAULT_PAGE_SIZE,
    )?;
    let max_page_size =
        page_size_from_env_value(std::env::var("CAREBOOK_MAX_PAGE_SIZE").ok(), MAX_PAGE_SIZE)?;
    let cfg = Arc::new(CoreConfig::new(data_file, default_page_size, max_page_size)?);

    let db = LocalDatabase::from_data_file(cfg.data_file())?;
    match db.path() {
        Some(path) => tracing::info!("++ Using data file {}", path.display()),
        None => tracing::warn!("++ CAREBOOK_DATA_FILE not set, data will not survive a restart"),
    }

    let services = CoreServices::new(Arc::new(db), Arc::new(RolePolicy), cfg);
    let state = AppState::new(services, &rest_cfg.jwt_secret);

    api_rest::serve(&rest_cfg, state).await
}
