use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;

use crate::auth::check_user_id;
use crate::db::posts::{self, PostFilter, PostSort};
use crate::db::tags;
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::routes::{parse_page, require_user};
use crate::sanitize::sanitize;
use crate::state::AppState;
use crate::views::PostView;

#[derive(Deserialize, Default)]
pub struct ListPostsQuery {
    pub page: Option<String>,
    pub user: Option<String>,
    pub tag: Option<String>,
    pub query: Option<String>,
    pub sort: Option<String>,
}

#[derive(Deserialize)]
pub struct CreatePostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: String,
}

#[derive(Deserialize)]
pub struct UpdatePostForm {
    #[serde(default)]
    pub body: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route(
            "/api/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Translate query parameters into store filters. Live posts only.
fn filters_for(query: &ListPostsQuery) -> AppResult<Vec<PostFilter>> {
    let mut filters = vec![PostFilter::NotDeleted];

    if let Some(user) = non_empty(query.user.clone()) {
        filters.push(PostFilter::Author(user));
    }
    if let Some(tag) = non_empty(query.tag.clone()) {
        let tag_id = tag
            .parse()
            .map_err(|_| AppError::bad_request("Invalid tag"))?;
        filters.push(PostFilter::Tag(tag_id));
    }
    if let Some(needle) = non_empty(query.query.clone()) {
        filters.push(PostFilter::Search(needle));
    }

    Ok(filters)
}

/// GET /api/posts?page=&user=&tag=&query=&sort=
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let page = parse_page(query.page.as_deref(), posts::PAGE_SIZE)?;
    let filters = filters_for(&query)?;
    let sort = query
        .sort
        .as_deref()
        .and_then(PostSort::parse)
        .unwrap_or_default();

    let posts = posts::list_posts(&state.db, filters, sort, page)?;
    Ok(Json(posts.into_iter().map(PostView::from).collect()))
}

/// GET /api/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PostView>> {
    Ok(Json(posts::get_post(&state.db, id)?.into()))
}

/// POST /api/posts
async fn create_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Form(form): Form<CreatePostForm>,
) -> AppResult<Json<PostView>> {
    if form.title.is_empty() {
        return Err(AppError::bad_request("Title is required"));
    }
    let user = require_user(user)?;

    let post_id = posts::create_post(&state.db, user.id, &form.title, &sanitize(&form.body))?;

    for name in tags::parse_tag_candidates(&form.tags) {
        let attached = tags::create_tag(&state.db, &name)
            .and_then(|_| tags::attach_tag(&state.db, post_id, &name));
        if let Err(e) = attached {
            tracing::warn!("Could not tag post {} with {}: {}", post_id, name, e);
        }
    }

    Ok(Json(posts::get_post(&state.db, post_id)?.into()))
}

/// PATCH /api/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
    Form(form): Form<UpdatePostForm>,
) -> AppResult<Json<PostView>> {
    let post = posts::get_post(&state.db, id)?;
    if post.deleted {
        return Err(AppError::bad_request("Post is deleted"));
    }
    if !check_user_id(&state.db, user.user(), post.author.id) {
        return Err(AppError::Unauthorized);
    }

    if !posts::update_post(&state.db, id, &post.title, &sanitize(&form.body))? {
        return Err(AppError::bad_request("Post is deleted"));
    }
    Ok(Json(posts::get_post(&state.db, id)?.into()))
}

/// DELETE /api/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Json<PostView>> {
    let post = posts::get_post(&state.db, id)?;
    if post.deleted {
        return Err(AppError::bad_request("Post is already deleted"));
    }
    if !check_user_id(&state.db, user.user(), post.author.id) {
        return Err(AppError::Unauthorized);
    }

    if !posts::delete_post(&state.db, id)? {
        return Err(AppError::bad_request("Post is already deleted"));
    }
    tracing::info!("Post {} deleted", id);
    Ok(Json(posts::get_post(&state.db, id)?.into()))
}
