//! Terminal handler: static files, liveness, then collaborators.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;
use crate::http::static_files::StaticMounts;
use crate::routing::RouteTable;

/// Body of the liveness response on `GET /`.
pub const LIVENESS_MESSAGE: &str = "API is running 🚀";

/// State shared by the terminal handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub statics: Arc<StaticMounts>,
}

/// Resolve an admitted request.
///
/// Static mounts are tried first and fall through on a miss. `GET /` answers
/// the liveness check. Everything else goes to the first mount owning the
/// path, or ends as a 404.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Result<Response, GatewayError> {
    let (parts, body) = request.into_parts();
    if let Some(response) = state.statics.serve(&parts).await {
        return Ok(response);
    }

    let path = parts.uri.path().to_owned();
    let is_read = parts.method == Method::GET || parts.method == Method::HEAD;

    if path == "/" && is_read {
        return Ok(LIVENESS_MESSAGE.into_response());
    }

    let Some(mount) = state.routes.match_path(&path) else {
        return Err(GatewayError::NotFound { path });
    };

    tracing::debug!(route = mount.name(), prefix = mount.prefix(), path = %path, "Dispatching");
    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(mount.mounted_prefix());

    mount
        .collaborator()
        .handle(request)
        .await
        .map_err(|source| GatewayError::upstream(mount.name(), source))
}
