use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;

use crate::auth::require_admin;
use crate::db::models::Tag;
use crate::db::query::Page;
use crate::db::tags::{self, TagFilter};
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::routes::parse_page;
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct ListTagsQuery {
    pub page: Option<String>,
    pub query: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTagForm {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tags", get(list_tags))
        .route("/api/tags/trending", get(trending_tags))
        .route("/api/tags/{id}", get(get_tag).patch(update_tag))
}

/// GET /api/tags?query=&page=
async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<ListTagsQuery>,
) -> AppResult<Json<Vec<Tag>>> {
    let page = parse_page(query.page.as_deref(), tags::PAGE_SIZE)?;
    let filters = query
        .query
        .filter(|q| !q.is_empty())
        .map(TagFilter::NameContains)
        .into_iter()
        .collect();
    Ok(Json(tags::list_tags(&state.db, filters, page)?))
}

/// GET /api/tags/trending
async fn trending_tags(State(state): State<AppState>) -> AppResult<Json<Vec<Tag>>> {
    let page = Page::first(tags::TRENDING_PAGE_SIZE);
    Ok(Json(tags::list_tags(&state.db, vec![TagFilter::Trending], page)?))
}

/// GET /api/tags/{id}
async fn get_tag(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<Tag>> {
    Ok(Json(tags::get_tag(&state.db, id)?))
}

/// PATCH /api/tags/{id} (admin only)
async fn update_tag(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
    Form(form): Form<UpdateTagForm>,
) -> AppResult<Json<Tag>> {
    tags::get_tag(&state.db, id)?;
    if !require_admin(&state.db, user.user()) {
        return Err(AppError::Unauthorized);
    }

    tags::update_tag(&state.db, id, &form.color, &form.description)?;
    Ok(Json(tags::get_tag(&state.db, id)?))
}
