//! Configuration parsing and validation

use crate::error::{HelperError, Result};
use crate::middleware::INTERNAL_PREFIX;
use crate::oidc::OAuthClientConfig;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_CALLBACK_URL: &str = "http://localhost:8000/callback";
const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8000";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "oidc-kubeconfig-helper",
    version,
    about = "Log in through an OIDC provider and receive a kubeconfig user entry",
    long_about = "Serves a browser login flow against an OpenID Connect provider and answers the callback with a kubeconfig fragment carrying the issued id and refresh tokens"
)]
pub struct Config {
    /// OIDC provider (issuer) URL, e.g. https://idp.example.com
    #[arg(long, env = "OIDC_PROVIDER")]
    pub provider: String,

    /// OAuth client ID
    #[arg(long, env = "OIDC_CLIENT_ID")]
    pub client_id: String,

    /// OAuth client secret
    #[arg(long, env = "OIDC_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Absolute callback URL registered with the provider
    #[arg(long, env = "OIDC_CALLBACK_URL", default_value = DEFAULT_CALLBACK_URL)]
    pub callback_url: String,

    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDRESS", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen: String,

    /// Seconds an issued login state stays valid
    #[arg(long, env = "STATE_TTL_SECS", default_value_t = 300)]
    pub state_ttl_secs: u64,

    /// Timeout for requests to the provider, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
    pub http_timeout_secs: u64,

    /// Show only error messages
    #[arg(long, conflicts_with = "debug")]
    pub silent: bool,

    /// Enable debug logging
    #[arg(long, env = "KUBECONFIG_HELPER_DEBUG")]
    pub debug: bool,
}

impl Config {
    /// Parse configuration from CLI arguments and environment variables
    pub fn parse_args() -> Self {
        Config::parse()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.provider.is_empty() {
            return Err(HelperError::Config("OIDC provider URL is required".to_string()));
        }

        if self.client_id.is_empty() {
            return Err(HelperError::Config("OIDC client ID is required".to_string()));
        }

        if self.client_secret.is_empty() {
            return Err(HelperError::Config("OIDC client secret is required".to_string()));
        }

        if self.callback_url.is_empty() {
            return Err(HelperError::Config("Callback URL is required".to_string()));
        }

        url::Url::parse(&self.provider)
            .map_err(|e| HelperError::Config(format!("Invalid OIDC provider URL: {}", e)))?;

        url::Url::parse(&self.callback_url)
            .map_err(|e| HelperError::Config(format!("Invalid callback URL: {}", e)))?;

        let callback_path = self.callback_path()?;
        if callback_path == "/" || callback_path.starts_with(INTERNAL_PREFIX) {
            return Err(HelperError::Config(format!(
                "Callback URL path {} collides with a built-in route",
                callback_path
            )));
        }

        self.listen_addr()?;

        if self.state_ttl_secs == 0 {
            return Err(HelperError::Config("State TTL must be positive".to_string()));
        }

        if self.http_timeout_secs == 0 {
            return Err(HelperError::Config("HTTP timeout must be positive".to_string()));
        }

        Ok(())
    }

    /// Parsed listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| HelperError::Config(format!("Invalid listen address '{}': {}", self.listen, e)))
    }

    /// Path component of the callback URL, used to mount the callback route
    pub fn callback_path(&self) -> Result<String> {
        let url = url::Url::parse(&self.callback_url)?;
        Ok(url.path().to_string())
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Client registration handed to the OIDC client
    pub fn oauth_client(&self) -> OAuthClientConfig {
        OAuthClientConfig::new(
            self.client_id.clone(),
            self.client_secret.clone(),
            self.callback_url.clone(),
        )
    }

    /// Get log level based on flags
    pub fn log_level(&self) -> tracing::Level {
        if self.silent {
            tracing::Level::ERROR
        } else if self.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
