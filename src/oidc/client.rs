//! OIDC client implementation
//!
//! Drives the OAuth 2.0 authorization code flow on behalf of browsers: builds
//! the authorization redirect, then redeems the callback for verified tokens
//! and turns them into a kubeconfig user entry.

use super::jwks::KeySet;
use super::pkce::Pkce;
use super::state::StateStore;
use super::verifier::IdTokenVerifier;
use super::{ProviderMetadata, TokenResponse};
use crate::error::{HelperError, Result};
use crate::kubeconfig::KubeCredentialDocument;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Scopes requested on every login.
pub const SCOPES: [&str; 4] = ["openid", "profile", "email", "offline_access"];

/// Client registration with the provider.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl OAuthClientConfig {
    pub fn new(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_url,
        }
    }

    pub fn scope(&self) -> String {
        SCOPES.join(" ")
    }
}

/// Where to send the browser to start a login.
#[derive(Debug, Clone)]
pub struct AuthRedirect {
    pub url: String,
    pub state: String,
}

/// OIDC client shared by all request handlers
pub struct OidcClient {
    provider: ProviderMetadata,
    client: OAuthClientConfig,
    http: reqwest::Client,
    states: Arc<StateStore>,
    verifier: IdTokenVerifier,
}

impl OidcClient {
    /// Discover the provider and build a client for it
    pub async fn discover(
        issuer_url: &str,
        client: OAuthClientConfig,
        state_ttl: Duration,
        http_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| HelperError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let provider = ProviderMetadata::discover(&http, issuer_url).await?;
        Ok(Self::new(provider, client, http, state_ttl))
    }

    pub fn new(
        provider: ProviderMetadata,
        client: OAuthClientConfig,
        http: reqwest::Client,
        state_ttl: Duration,
    ) -> Self {
        let keys = KeySet::new(http.clone(), provider.jwks_uri.clone());
        let verifier = IdTokenVerifier::new(provider.issuer.clone(), client.client_id.clone(), keys);

        Self {
            provider,
            client,
            http,
            states: Arc::new(StateStore::new(state_ttl)),
            verifier,
        }
    }

    pub fn provider(&self) -> &ProviderMetadata {
        &self.provider
    }

    pub fn client_config(&self) -> &OAuthClientConfig {
        &self.client
    }

    pub fn states(&self) -> Arc<StateStore> {
        self.states.clone()
    }

    /// Start a login: mint state and PKCE, return the authorization URL
    pub fn begin_auth(&self) -> Result<AuthRedirect> {
        let pkce = Pkce::generate();
        let state = self.states.issue(pkce.verifier);
        let url = self.build_authorization_url(&state, &pkce.challenge)?;

        tracing::debug!("Issued authorization redirect");
        Ok(AuthRedirect { url, state })
    }

    /// Complete a login from the callback's `state` and `code`
    pub async fn handle_callback(&self, state: &str, code: &str) -> Result<KubeCredentialDocument> {
        let code_verifier = self.states.consume(state)?;

        let tokens = self.exchange_code_for_tokens(code, &code_verifier).await?;
        let raw_id_token = tokens.id_token().ok_or(HelperError::MissingIdentityToken)?;

        let claims = self.verifier.verify(raw_id_token).await?;
        if !claims.email_verified {
            tracing::warn!(email = %claims.email, "Issuing kubeconfig for unverified email");
        }
        if tokens.refresh_token().is_empty() {
            tracing::warn!(email = %claims.email, "Provider issued no refresh token");
        }

        tracing::info!(
            email = %claims.email,
            expires_at = ?tokens.expiry(chrono::Utc::now()),
            "Login completed"
        );

        Ok(KubeCredentialDocument::for_user(
            &claims.email,
            &claims.iss,
            &self.client.client_id,
            &self.client.client_secret,
            raw_id_token,
            tokens.refresh_token(),
        ))
    }

    /// Exchange authorization code for tokens
    ///
    /// Client credentials are sent as HTTP Basic unless the provider only
    /// accepts them in the form body.
    async fn exchange_code_for_tokens(&self, code: &str, code_verifier: &str) -> Result<TokenResponse> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.client.redirect_url.as_str()),
            ("code_verifier", code_verifier),
        ];

        let mut request = self
            .http
            .post(&self.provider.token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json");

        if self.provider.uses_client_secret_post() {
            params.push(("client_id", self.client.client_id.as_str()));
            params.push(("client_secret", self.client.client_secret.as_str()));
        } else {
            request = request.basic_auth(
                form_encode(&self.client.client_id),
                Some(form_encode(&self.client.client_secret)),
            );
        }

        let response = request
            .form(&params)
            .send()
            .await
            .map_err(|e| HelperError::TokenExchangeFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(HelperError::TokenExchangeFailed(format!(
                "token endpoint returned status {}: {}",
                status,
                body.trim()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| HelperError::TokenExchangeFailed(format!("invalid token response: {}", e)))
    }

    fn build_authorization_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        let mut url = Url::parse(&self.provider.authorization_endpoint)?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client.client_id)
            .append_pair("redirect_uri", &self.client.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.client.scope())
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(url.to_string())
    }
}

/// `application/x-www-form-urlencoded` encoding applied to Basic credentials
fn form_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
