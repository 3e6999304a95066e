use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    error::AppResult,
    state::AppState,
    uploads::services::PresignedUpload,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest {
    pub content_type: Option<String>,
}

pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/upload/presigned-url", post(presigned_url))
}

/// The client PUTs the file straight to `url` with the same Content-Type.
#[instrument(skip(state, _user, payload))]
pub async fn presigned_url(
    State(state): State<AppState>,
    _user: AuthUser,
    payload: Option<Json<PresignRequest>>,
) -> AppResult<Json<PresignedUpload>> {
    let Json(req) = payload.unwrap_or_default();
    Ok(Json(state.uploads.presigned_url(req.content_type.as_deref()).await?))
}
