//! OIDC provider discovery
//!
//! Fetches provider metadata from /.well-known/openid-configuration

use crate::error::{HelperError, Result};
use serde::Deserialize;

/// Token endpoint auth method sending credentials in an HTTP Basic header.
pub const CLIENT_SECRET_BASIC: &str = "client_secret_basic";
/// Token endpoint auth method sending credentials in the form body.
pub const CLIENT_SECRET_POST: &str = "client_secret_post";

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub jwks_uri: String,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Option<Vec<String>>,
}

impl ProviderMetadata {
    /// Discover provider metadata from the issuer URL
    pub async fn discover(http: &reqwest::Client, issuer_url: &str) -> Result<Self> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            issuer_url.trim_end_matches('/')
        );

        tracing::info!("Initialising OIDC discovery endpoint: {}", discovery_url);

        let response = http
            .get(&discovery_url)
            .send()
            .await
            .map_err(|e| HelperError::DiscoveryFailed(format!("Failed to fetch OIDC configuration: {}", e)))?;

        if !response.status().is_success() {
            return Err(HelperError::DiscoveryFailed(format!(
                "OIDC discovery request failed with status: {}",
                response.status()
            )));
        }

        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| HelperError::DiscoveryFailed(format!("Failed to parse OIDC configuration: {}", e)))?;

        metadata.check(issuer_url)?;
        Ok(metadata)
    }

    /// Whether client credentials go in the token request body.
    ///
    /// HTTP Basic is the default; the body is used only when the provider
    /// advertises `client_secret_post` without `client_secret_basic`.
    pub fn uses_client_secret_post(&self) -> bool {
        self.token_endpoint_auth_methods_supported
            .as_ref()
            .is_some_and(|methods| {
                methods.iter().any(|m| m == CLIENT_SECRET_POST)
                    && !methods.iter().any(|m| m == CLIENT_SECRET_BASIC)
            })
    }

    fn check(&self, issuer_url: &str) -> Result<()> {
        if self.issuer.trim_end_matches('/') != issuer_url.trim_end_matches('/') {
            return Err(HelperError::DiscoveryFailed(format!(
                "issuer did not match the issuer returned by provider, expected {:?} got {:?}",
                issuer_url, self.issuer
            )));
        }

        if self.authorization_endpoint.is_empty() {
            return Err(HelperError::DiscoveryFailed(
                "OIDC configuration missing authorization_endpoint".to_string(),
            ));
        }

        if self.token_endpoint.is_empty() {
            return Err(HelperError::DiscoveryFailed(
                "OIDC configuration missing token_endpoint".to_string(),
            ));
        }

        if self.jwks_uri.is_empty() {
            return Err(HelperError::DiscoveryFailed(
                "OIDC configuration missing jwks_uri".to_string(),
            ));
        }

        Ok(())
    }
}
