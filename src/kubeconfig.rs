//! Kubeconfig user entries
//!
//! Builds the `users:` section kubectl needs to authenticate with the OIDC
//! auth provider, and serializes it to YAML.

use crate::error::{HelperError, Result};
use serde::{Deserialize, Serialize};

const API_VERSION: &str = "v1";
const KIND: &str = "Config";
const AUTH_PROVIDER_NAME: &str = "oidc";

/// A kubeconfig holding a single OIDC-authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeCredentialDocument {
    pub api_version: String,
    pub kind: String,
    pub users: Vec<NamedAuthInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedAuthInfo {
    pub name: String,
    pub user: AuthInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(rename = "auth-provider")]
    pub auth_provider: AuthProvider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthProvider {
    pub name: String,
    pub config: AuthProviderConfig,
}

/// Settings read by kubectl's `oidc` auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthProviderConfig {
    pub idp_issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub id_token: String,
    pub refresh_token: String,
}

impl KubeCredentialDocument {
    /// Kubeconfig with one user, named after its email
    pub fn for_user(
        email: &str,
        issuer: &str,
        client_id: &str,
        client_secret: &str,
        id_token: &str,
        refresh_token: &str,
    ) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            users: vec![NamedAuthInfo {
                name: email.to_string(),
                user: AuthInfo {
                    auth_provider: AuthProvider {
                        name: AUTH_PROVIDER_NAME.to_string(),
                        config: AuthProviderConfig {
                            idp_issuer_url: issuer.to_string(),
                            client_id: client_id.to_string(),
                            client_secret: client_secret.to_string(),
                            id_token: id_token.to_string(),
                            refresh_token: refresh_token.to_string(),
                        },
                    },
                },
            }],
        }
    }

    /// Look up a user's auth provider settings by name
    pub fn user(&self, name: &str) -> Option<&AuthProviderConfig> {
        self.users
            .iter()
            .find(|u| u.name == name)
            .map(|u| &u.user.auth_provider.config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| HelperError::SerializationFailed(e.to_string()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| HelperError::SerializationFailed(e.to_string()))
    }
}
