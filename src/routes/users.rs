use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;

use crate::auth::check_user_id;
use crate::auth::session::clear_session_cookie;
use crate::avatar;
use crate::db::models::User;
use crate::db::users::{self, UserChanges};
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::routes::auth::MIN_PASSWORD_LEN;
use crate::state::AppState;
use crate::views::UserView;

#[derive(Deserialize)]
pub struct UpdateUserForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub bio: String,
}

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/api/users/{id}",
            get(get_user).post(update_user).delete(delete_user),
        )
        .route(
            "/api/users/{id}/avatar",
            post(upload_avatar)
                .delete(delete_avatar)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

/// Fetch a live user the actor is allowed to modify.
fn editable_user(state: &AppState, actor: &MaybeUser, id: i64) -> AppResult<User> {
    let user = users::get_user(&state.db, id)?;
    if user.deleted {
        return Err(AppError::bad_request("User is deleted"));
    }
    if !check_user_id(&state.db, actor.user(), id) {
        return Err(AppError::Unauthorized);
    }
    Ok(user)
}

fn changes_from(form: UpdateUserForm) -> AppResult<UserChanges> {
    if !form.password.is_empty() && form.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "Password must be at least 8 characters",
        ));
    }
    Ok(UserChanges {
        password: Some(form.password).filter(|p| !p.is_empty()),
        bio: Some(form.bio).filter(|b| !b.is_empty()),
    })
}

/// GET /api/users/{id}
async fn get_user(State(state): State<AppState>, Path(id): Path<i64>) -> AppResult<Json<UserView>> {
    Ok(Json(users::get_user(&state.db, id)?.into()))
}

/// POST /api/users/{id}
async fn update_user(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<i64>,
    Form(form): Form<UpdateUserForm>,
) -> AppResult<Json<UserView>> {
    let changes = changes_from(form)?;
    editable_user(&state, &actor, id)?;

    users::update_user(&state.db, id, &changes, state.config.auth.password_cost)?;
    Ok(Json(users::get_user(&state.db, id)?.into()))
}

/// DELETE /api/users/{id}
///
/// Users deleting their own account are signed out as well.
async fn delete_user(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    editable_user(&state, &actor, id)?;

    if !users::delete_user(&state.db, id)? {
        return Err(AppError::bad_request("User is deleted"));
    }
    tracing::info!("User {} deleted", id);

    let body = Json(UserView::from(users::get_user(&state.db, id)?));
    let signing_out = actor.user().is_some_and(|a| a.id == id);
    if signing_out {
        let cookie = clear_session_cookie(&state.config.auth);
        Ok(([(header::SET_COOKIE, cookie)], body).into_response())
    } else {
        Ok(body.into_response())
    }
}

/// Read the `file` field of a multipart upload.
async fn read_file_field(mut multipart: Multipart) -> AppResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(AppError::bad_request("Missing file"))
}

/// POST /api/users/{id}/avatar (multipart, field `file`)
async fn upload_avatar(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> AppResult<Json<UserView>> {
    let user = editable_user(&state, &actor, id)?;

    let upload = read_file_field(multipart).await?;
    let format = avatar::detect_format(&upload)
        .ok_or_else(|| AppError::bad_request("Avatar must be a JPEG or PNG image"))?;

    let thumb = tokio::task::spawn_blocking(move || avatar::thumbnail(&upload, format))
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))??;

    let dir = state.config.uploads_path();
    let public_path = avatar::store(&dir, &thumb, format)?;
    if let Some(old) = user.avatar.as_deref() {
        avatar::remove(&dir, old)?;
    }

    users::update_avatar(&state.db, id, Some(&public_path))?;
    Ok(Json(users::get_user(&state.db, id)?.into()))
}

/// DELETE /api/users/{id}/avatar
async fn delete_avatar(
    State(state): State<AppState>,
    actor: MaybeUser,
    Path(id): Path<i64>,
) -> AppResult<Json<UserView>> {
    let user = editable_user(&state, &actor, id)?;
    let old = user
        .avatar
        .ok_or_else(|| AppError::bad_request("User has no avatar"))?;

    avatar::remove(&state.config.uploads_path(), &old)?;
    users::update_avatar(&state.db, id, None)?;
    Ok(Json(users::get_user(&state.db, id)?.into()))
}
