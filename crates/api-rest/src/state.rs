use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use carebook_core::{CoreServices, LocalDatabase};

/// Settings of the HTTP server, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub addr: SocketAddr,
    pub jwt_secret: String,
}

pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

impl RestConfig {
    /// Builds the config from raw environment values.
    ///
    /// # Errors
    /// Returns an error if the address does not parse or the secret is missing or empty.
    pub fn from_env_values(
        addr: Option<String>,
        jwt_secret: Option<String>,
    ) -> anyhow::Result<Self> {
        let addr = addr
            .unwrap_or_else(|| DEFAULT_REST_ADDR.into())
            .parse()
            .context("CAREBOOK_REST_ADDR is not a socket address")?;
        let jwt_secret = jwt_secret
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("JWT_SECRET must be set")?;
        Ok(Self { addr, jwt_secret })
    }
}

/// Application state shared across REST API handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub services: Arc<CoreServices<LocalDatabase>>,
    pub jwt_secret: Arc<str>,
}

impl AppState {
    pub fn new(services: CoreServices<LocalDatabase>, jwt_secret: &str) -> Self {
        Self {
            services: Arc::new(services),
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
