use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;

use crate::db::models::Reaction;
use crate::db::reactions::{self, ReactionTarget};
use crate::db::{comments, posts};
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::routes::require_user;
use crate::state::{AppState, DbPool};

#[derive(Deserialize)]
pub struct ReactionForm {
    #[serde(default)]
    pub reaction: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/reactions/{kind}/{id}",
            get(list_reactions).post(set_reaction),
        )
        .route("/api/reactions/{kind}/{id}/{user_id}", get(get_user_reaction))
}

/// `post` or `comment`; any other segment is not a route.
fn target(kind: &str) -> AppResult<ReactionTarget> {
    match kind {
        "post" => Ok(ReactionTarget::Post),
        "comment" => Ok(ReactionTarget::Comment),
        _ => Err(AppError::NotFound),
    }
}

/// Whether the post or comment being reacted to has been deleted.
fn target_deleted(db: &DbPool, target: ReactionTarget, id: i64) -> AppResult<bool> {
    Ok(match target {
        ReactionTarget::Post => posts::get_post(db, id)?.deleted,
        ReactionTarget::Comment => comments::get_comment(db, id)?.deleted,
    })
}

/// GET /api/reactions/{post|comment}/{id}
async fn list_reactions(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> AppResult<Json<Vec<Reaction>>> {
    let target = target(&kind)?;
    Ok(Json(reactions::list_reactions(&state.db, target, id)?))
}

/// GET /api/reactions/{post|comment}/{id}/{user_id}
async fn get_user_reaction(
    State(state): State<AppState>,
    Path((kind, id, user_id)): Path<(String, i64, i64)>,
) -> AppResult<Json<Reaction>> {
    let target = target(&kind)?;
    Ok(Json(reactions::get_user_reaction(&state.db, target, user_id, id)?))
}

/// POST /api/reactions/{post|comment}/{id}
///
/// An empty `reaction` clears the caller's reaction; anything else replaces it.
async fn set_reaction(
    State(state): State<AppState>,
    user: MaybeUser,
    Path((kind, id)): Path<(String, i64)>,
    Form(form): Form<ReactionForm>,
) -> AppResult<StatusCode> {
    let target = target(&kind)?;
    let deleted = target_deleted(&state.db, target, id)?;
    let user = require_user(user)?;

    if form.reaction.is_empty() {
        reactions::clear_reaction(&state.db, target, user.id, id)?;
        return Ok(StatusCode::NO_CONTENT);
    }

    if deleted {
        return Err(AppError::bad_request("Cannot react to deleted content"));
    }
    if !reactions::set_reaction(&state.db, target, user.id, id, &form.reaction)? {
        return Err(AppError::bad_request(format!(
            "Unknown reaction {}",
            form.reaction
        )));
    }
    Ok(StatusCode::NO_CONTENT)
}
