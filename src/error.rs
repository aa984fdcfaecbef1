//! Error types for the kubeconfig helper

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("OIDC discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Invalid state")]
    InvalidState,

    #[error("Authorization denied by provider: {0}")]
    AuthorizationDenied(String),

    #[error("Missing code parameter in callback")]
    MissingCode,

    #[error("Failed to exchange token: {0}")]
    TokenExchangeFailed(String),

    #[error("No id_token field in oauth2 token")]
    MissingIdentityToken,

    #[error("Failed to verify ID Token: {0}")]
    IdentityTokenInvalid(String),

    #[error("Failed to parse claims: {0}")]
    ClaimsDecodeFailed(String),

    #[error("Failed to serialize kubeconfig: {0}")]
    SerializationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl HelperError {
    /// HTTP status reported to the browser when this error ends a request
    pub fn status_code(&self) -> StatusCode {
        match self {
            HelperError::InvalidState
            | HelperError::AuthorizationDenied(_)
            | HelperError::MissingCode
            | HelperError::TokenExchangeFailed(_)
            | HelperError::MissingIdentityToken => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, HelperError>;
