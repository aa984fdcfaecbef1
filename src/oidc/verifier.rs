//! ID token verification

use super::jwks::KeySet;
use crate::error::{HelperError, Result};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use serde::Deserialize;
use tracing::debug;

/// Audience can be a single string or array of strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::Single(s) => s == aud,
            Audience::Multiple(v) => v.iter().any(|a| a == aud),
        }
    }
}

/// Claims read from a verified ID token. Required fields fail closed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdentityClaims {
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub iss: String,
    pub aud: Audience,
    pub exp: i64,
    #[serde(default)]
    pub sub: Option<String>,
}

/// Verifies RS256 ID tokens issued to one client by one provider.
pub struct IdTokenVerifier {
    issuer: String,
    client_id: String,
    keys: KeySet,
}

impl IdTokenVerifier {
    pub fn new(issuer: String, client_id: String, keys: KeySet) -> Self {
        Self {
            issuer,
            client_id,
            keys,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = 0;
        validation
    }

    /// Check signature, issuer, audience and expiry, then decode the claims
    pub async fn verify(&self, raw_id_token: &str) -> Result<IdentityClaims> {
        let header = decode_header(raw_id_token)
            .map_err(|e| HelperError::IdentityTokenInvalid(format!("malformed jwt: {}", e)))?;

        if header.alg != Algorithm::RS256 {
            return Err(HelperError::IdentityTokenInvalid(format!(
                "id token signed with unsupported algorithm, expected RS256 got {:?}",
                header.alg
            )));
        }

        let keys = self
            .keys
            .keys_for(header.kid.as_deref())
            .await
            .map_err(HelperError::IdentityTokenInvalid)?;

        let validation = self.validation();
        let mut last_error = None;
        for key in &keys {
            match decode::<serde_json::Value>(raw_id_token, key, &validation) {
                Ok(token) => return decode_claims(token.claims),
                Err(e) if matches!(e.kind(), ErrorKind::InvalidSignature) => {
                    last_error = Some(e);
                }
                Err(e) => return Err(HelperError::IdentityTokenInvalid(e.to_string())),
            }
        }

        debug!(candidates = keys.len(), "No signing key verified the id token");
        Err(HelperError::IdentityTokenInvalid(
            last_error
                .map(|e| format!("failed to verify signature: {}", e))
                .unwrap_or_else(|| "failed to verify signature".to_string()),
        ))
    }
}

fn decode_claims(payload: serde_json::Value) -> Result<IdentityClaims> {
    serde_json::from_value(payload).map_err(|e| HelperError::ClaimsDecodeFailed(e.to_string()))
}
