//! Provider signing keys
//!
//! Keys are fetched from the provider's `jwks_uri` the first time a token is
//! verified and refetched whenever a token names a key id we haven't seen,
//! at most once per refresh interval.

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// JWKS document served by the provider.
#[derive(Debug, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Individual JSON Web Key.
#[derive(Debug, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: Option<String>,
    pub alg: Option<String>,
    #[serde(rename = "use")]
    pub key_use: Option<String>,
    /// RSA modulus (base64url)
    pub n: Option<String>,
    /// RSA exponent (base64url)
    pub e: Option<String>,
}

impl Jwk {
    /// RS256 verification key, or `None` for keys that can't verify RS256
    fn rs256_key(&self) -> Option<DecodingKey> {
        if self.kty != "RSA" || self.key_use.as_deref() == Some("enc") {
            return None;
        }
        if self.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            return None;
        }

        let (n, e) = (self.n.as_ref()?, self.e.as_ref()?);
        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(kid = ?self.kid, error = %e, "Failed to parse JWK, skipping");
                None
            }
        }
    }
}

struct CachedKey {
    kid: Option<String>,
    key: DecodingKey,
}

/// Minimum time between two JWKS fetches triggered by unknown key ids.
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Lazily populated RS256 key set.
pub struct KeySet {
    jwks_uri: String,
    http: reqwest::Client,
    keys: RwLock<Vec<CachedKey>>,
    /// Last successful refresh
    last_refresh: RwLock<Option<Instant>>,
    min_refresh_interval: Duration,
}

impl KeySet {
    pub fn new(http: reqwest::Client, jwks_uri: String) -> Self {
        Self::with_min_refresh_interval(http, jwks_uri, DEFAULT_MIN_REFRESH_INTERVAL)
    }

    pub fn with_min_refresh_interval(
        http: reqwest::Client,
        jwks_uri: String,
        min_refresh_interval: Duration,
    ) -> Self {
        Self {
            jwks_uri,
            http,
            keys: RwLock::new(Vec::new()),
            last_refresh: RwLock::new(None),
            min_refresh_interval,
        }
    }

    /// Candidate keys for a token header.
    ///
    /// With a `kid`, returns the matching key (refetching once on a miss,
    /// unless the set was refreshed within the minimum interval).
    /// Without one, returns every cached key.
    pub async fn keys_for(&self, kid: Option<&str>) -> Result<Vec<DecodingKey>, String> {
        let cached = self.lookup(kid).await;
        if !cached.is_empty() {
            return Ok(cached);
        }

        if self.refreshed_recently().await {
            debug!(kid = ?kid, "Signing key not cached and JWKS refreshed recently, not refetching");
            return Err(missing_key(kid));
        }

        debug!(kid = ?kid, "Signing key not cached, fetching JWKS");
        self.refresh().await?;

        let keys = self.lookup(kid).await;
        if keys.is_empty() {
            return Err(missing_key(kid));
        }
        Ok(keys)
    }

    async fn refreshed_recently(&self) -> bool {
        self.last_refresh
            .read()
            .await
            .is_some_and(|at| at.elapsed() < self.min_refresh_interval)
    }

    async fn lookup(&self, kid: Option<&str>) -> Vec<DecodingKey> {
        self.keys
            .read()
            .await
            .iter()
            .filter(|cached| kid.is_none() || cached.kid.as_deref() == kid)
            .map(|cached| cached.key.clone())
            .collect()
    }

    /// Replace the cached keys with the provider's current set
    pub async fn refresh(&self) -> Result<(), String> {
        let response = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| format!("failed to fetch keys: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("JWKS endpoint returned status {}", response.status()));
        }

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| format!("failed to decode keys: {}", e))?;

        let fresh: Vec<CachedKey> = jwks
            .keys
            .iter()
            .filter_map(|jwk| {
                jwk.rs256_key().map(|key| CachedKey {
                    kid: jwk.kid.clone(),
                    key,
                })
            })
            .collect();

        info!(url = %self.jwks_uri, key_count = fresh.len(), "JWKS refreshed");
        *self.keys.write().await = fresh;
        *self.last_refresh.write().await = Some(Instant::now());
        Ok(())
    }
}

fn missing_key(kid: Option<&str>) -> String {
    match kid {
        Some(kid) => format!("no signing key with kid {:?} in JWKS", kid),
        None => "no RS256 signing keys in JWKS".to_string(),
    }
}
