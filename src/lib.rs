//! OIDC Kubeconfig Helper Library
//!
//! Browser login against an OpenID Connect provider that answers with a
//! kubeconfig user entry for kubectl's `oidc` auth provider.

pub mod config;
pub mod error;
pub mod kubeconfig;
pub mod middleware;
pub mod oidc;
pub mod server;
