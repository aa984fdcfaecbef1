//! HTTP surface
//!
//! `GET /` starts a login, the callback route finishes it and answers with a
//! kubeconfig. Health and metrics live under `/internal/`.

use crate::error::{HelperError, Result};
use crate::middleware::track_requests;
use crate::oidc::OidcClient;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Cookie tying a pending login to the browser that started it.
pub const STATE_COOKIE: &str = "oidc_kubeconfig_state";

/// How long in-flight requests may run after shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

const YAML_CONTENT_TYPE: &str = "application/yaml";

#[derive(Clone)]
pub struct AppState {
    oidc: Arc<OidcClient>,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(oidc: Arc<OidcClient>, metrics: Option<PrometheusHandle>) -> Self {
        Self { oidc, metrics }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl IntoResponse for HelperError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

/// Build the application router
pub fn router(state: AppState, callback_path: &str) -> Router {
    Router::new()
        .route("/", get(signin))
        .route(callback_path, get(callback))
        .route("/internal/healthz", get(healthz))
        .route("/internal/metrics", get(render_metrics))
        .layer(from_fn(track_requests))
        .with_state(state)
}

async fn signin(State(app): State<AppState>, jar: CookieJar) -> Result<Response> {
    let redirect = app.oidc.begin_auth()?;
    let secure = app.oidc.client_config().redirect_url.starts_with("https://");

    let cookie = Cookie::build((STATE_COOKIE, redirect.state))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax);

    Ok((
        StatusCode::FOUND,
        jar.add(cookie),
        [(header::LOCATION, redirect.url)],
    )
        .into_response())
}

async fn callback(
    State(app): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackQuery>,
) -> Result<Response> {
    if let Some(error) = params.error {
        let description = params
            .error_description
            .unwrap_or_else(|| "No description provided".to_string());
        return Err(HelperError::AuthorizationDenied(format!("{} - {}", error, description)));
    }

    let state = params.state.ok_or(HelperError::InvalidState)?;
    if jar.get(STATE_COOKIE).map(|c| c.value()) != Some(state.as_str()) {
        return Err(HelperError::InvalidState);
    }

    let code = params.code.filter(|c| !c.is_empty()).ok_or(HelperError::MissingCode)?;

    let kubeconfig = app.oidc.handle_callback(&state, &code).await?.to_yaml()?;

    Ok((
        jar.remove(Cookie::build(STATE_COOKIE).path("/")),
        [(header::CONTENT_TYPE, YAML_CONTENT_TYPE)],
        kubeconfig,
    )
        .into_response())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn render_metrics(State(app): State<AppState>) -> Response {
    match app.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `app` until `shutdown` resolves, then drain for at most `grace`
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F, grace: Duration) -> Result<()>
where
    F: Future<Output = ()>,
{
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = stop_rx.await;
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        result = &mut server => return flatten(result),
        _ = shutdown => {}
    }

    info!("Shutting down, waiting up to {:?} for in-flight requests", grace);
    let _ = stop_tx.send(());

    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => flatten(result),
        Err(_) => {
            warn!("Grace period elapsed, dropping remaining connections");
            server.abort();
            Ok(())
        }
    }
}

fn flatten(result: std::result::Result<std::io::Result<()>, tokio::task::JoinError>) -> Result<()> {
    match result {
        Ok(served) => Ok(served?),
        Err(e) => Err(HelperError::Io(std::io::Error::other(format!("server task failed: {}", e)))),
    }
}
