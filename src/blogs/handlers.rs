use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    blogs::{
        dto::DeletedResponse,
        repo_types::{BlogPatch, BlogPost, NewBlog},
    },
    error::{AppJson, AppResult},
    state::AppState,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/blogs", get(list_blogs))
        .route("/blogs/:id", get(get_blog))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/blogs", post(create_blog))
        .route("/blogs/:id", axum::routing::patch(update_blog).delete(delete_blog))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn list_blogs(State(state): State<AppState>) -> AppResult<Json<Vec<BlogPost>>> {
    Ok(Json(state.blogs.find_all().await?))
}

/// Public read; counts a view in the background.
#[instrument(skip(state))]
pub async fn get_blog(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<BlogPost>> {
    let post = state.blogs.find_one(&id).await?;

    let blogs = state.blogs.clone();
    tokio::spawn(async move { blogs.increment_view(&id).await });

    Ok(Json(post))
}

#[instrument(skip(state, _user, payload))]
pub async fn create_blog(
    State(state): State<AppState>,
    _user: AuthUser,
    AppJson(payload): AppJson<NewBlog>,
) -> AppResult<(StatusCode, Json<BlogPost>)> {
    let post = state.blogs.create(payload).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state, _user, patch))]
pub async fn update_blog(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
    AppJson(patch): AppJson<BlogPatch>,
) -> AppResult<Json<BlogPost>> {
    Ok(Json(state.blogs.update(&id, &patch).await?))
}

#[instrument(skip(state, _user))]
pub async fn delete_blog(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<DeletedResponse>> {
    state.blogs.remove(&id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}
