//! OIDC authorization code flow

pub mod client;
pub mod discovery;
pub mod jwks;
pub mod pkce;
pub mod state;
pub mod token;
pub mod verifier;

pub use client::{AuthRedirect, OAuthClientConfig, OidcClient, SCOPES};
pub use discovery::ProviderMetadata;
pub use state::StateStore;
pub use token::TokenResponse;
pub use verifier::{Audience, IdTokenVerifier, IdentityClaims};
