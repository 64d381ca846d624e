//! Server configuration
//!
//! Everything is read from environment variables with the `PPC_` prefix. Missing values fall back to defaults with
//! a logged warning, with one exception: the gateway server key has no useful default and the server refuses to
//! start without it, because it is what webhook signatures are verified against.

use std::env;

use gateway_client::GatewayConfig;
use log::*;

use crate::errors::ServerError;

const DEFAULT_PPC_HOST: &str = "127.0.0.1";
const DEFAULT_PPC_PORT: u16 = 8480;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/payments.db";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Gateway client configuration, including the server key used for Basic auth and webhook verification.
    pub gateway: GatewayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PPC_HOST.to_string(),
            port: DEFAULT_PPC_PORT,
            database_url: String::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env() -> Result<Self, ServerError> {
        let host = env::var("PPC_HOST").ok().unwrap_or_else(|| DEFAULT_PPC_HOST.into());
        let port = env::var("PPC_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for PPC_PORT. {e} Using the default, {DEFAULT_PPC_PORT}, \
                         instead."
                    );
                    DEFAULT_PPC_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_PPC_PORT);
        let database_url = env::var("PPC_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ PPC_DATABASE_URL not set, using {DEFAULT_DATABASE_URL} as default");
            DEFAULT_DATABASE_URL.to_string()
        });
        if env::var("PPC_GATEWAY_SERVER_KEY").is_err() {
            return Err(ServerError::ConfigurationError(
                "PPC_GATEWAY_SERVER_KEY is not set. The server cannot authenticate against the gateway or verify \
                 webhooks without it."
                    .to_string(),
            ));
        }
        let gateway = GatewayConfig::new_from_env_or_default();
        Ok(Self { host, port, database_url, gateway })
    }
}
