use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;

use crate::auth::check_user_id;
use crate::db::comments::{self, CommentFilter};
use crate::db::posts;
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::routes::{parse_page, require_user};
use crate::sanitize::sanitize;
use crate::state::AppState;
use crate::views::CommentView;

#[derive(Deserialize, Default)]
pub struct ListCommentsQuery {
    pub page: Option<String>,
    pub post: Option<String>,
    pub user: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CreateCommentQuery {
    pub post: Option<String>,
}

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub body: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/comments", get(list_comments).post(create_comment))
        .route(
            "/api/comments/{id}",
            get(get_comment).patch(update_comment).delete(delete_comment),
        )
}

fn parse_post_id(raw: Option<&str>) -> AppResult<i64> {
    raw.and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::bad_request("Invalid post"))
}

fn filters_for(query: &ListCommentsQuery) -> AppResult<Vec<CommentFilter>> {
    let mut filters = vec![CommentFilter::NotDeleted];

    if let Some(post) = query.post.as_deref().filter(|s| !s.is_empty()) {
        filters.push(CommentFilter::Post(parse_post_id(Some(post))?));
    }
    if let Some(user) = query.user.as_deref().filter(|s| !s.is_empty()) {
        filters.push(CommentFilter::Author(user.to_string()));
    }

    Ok(filters)
}

/// GET /api/comments?page=&post=&user=
async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<ListCommentsQuery>,
) -> AppResult<Json<Vec<CommentView>>> {
    let page = parse_page(query.page.as_deref(), comments::PAGE_SIZE)?;
    let filters = filters_for(&query)?;
    let comments = comments::list_comments(&state.db, filters, page)?;
    Ok(Json(comments.into_iter().map(CommentView::from).collect()))
}

/// GET /api/comments/{id}
async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<CommentView>> {
    Ok(Json(comments::get_comment(&state.db, id)?.into()))
}

/// POST /api/comments?post={id}
async fn create_comment(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<CreateCommentQuery>,
    Form(form): Form<CommentForm>,
) -> AppResult<Json<CommentView>> {
    let post_id = parse_post_id(query.post.as_deref())?;
    if form.body.is_empty() {
        return Err(AppError::bad_request("Comment cannot be empty"));
    }

    let post = posts::get_post(&state.db, post_id)?;
    if post.deleted {
        return Err(AppError::bad_request("Post is deleted"));
    }
    let user = require_user(user)?;

    let comment_id = comments::create_comment(&state.db, user.id, post_id, &sanitize(&form.body))?;
    Ok(Json(comments::get_comment(&state.db, comment_id)?.into()))
}

/// PATCH /api/comments/{id}
async fn update_comment(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Json<CommentView>> {
    let comment = comments::get_comment(&state.db, id)?;
    if comment.deleted {
        return Err(AppError::bad_request("Comment is deleted"));
    }
    if !check_user_id(&state.db, user.user(), comment.author.id) {
        return Err(AppError::Unauthorized);
    }

    if !comments::update_comment(&state.db, id, &sanitize(&form.body))? {
        return Err(AppError::bad_request("Comment is deleted"));
    }
    Ok(Json(comments::get_comment(&state.db, id)?.into()))
}

/// DELETE /api/comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Json<CommentView>> {
    let comment = comments::get_comment(&state.db, id)?;
    if comment.deleted {
        return Err(AppError::bad_request("Comment is already deleted"));
    }
    if !check_user_id(&state.db, user.user(), comment.author.id) {
        return Err(AppError::Unauthorized);
    }

    if !comments::delete_comment(&state.db, id)? {
        return Err(AppError::bad_request("Comment is already deleted"));
    }
    Ok(Json(comments::get_comment(&state.db, id)?.into()))
}
