use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::session::{clear_session_cookie, session_cookie};
use crate::db::models::Role;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;
pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct UsernameQuery {
    #[serde(default)]
    pub username: String,
}

#[derive(Serialize)]
struct SignedIn {
    id: i64,
}

#[derive(Serialize)]
struct Availability {
    available: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/checkUsername", get(check_username))
}

pub fn valid_username(username: &str) -> bool {
    (MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&username.len())
        && username
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Respond with the user id and a fresh session cookie.
fn sign_in(state: &AppState, user_id: i64) -> AppResult<Response> {
    let token = state.tokens.issue(user_id)?;
    let cookie = session_cookie(&state.config.auth, &token, state.tokens.lifetime_secs());
    Ok(([(header::SET_COOKIE, cookie)], Json(SignedIn { id: user_id })).into_response())
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    if !valid_username(&form.username) {
        return Err(AppError::bad_request(
            "Username must be 3-32 letters, digits or underscores",
        ));
    }
    if form.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let user_id = match users::create_user(
        &state.db,
        &form.username,
        &form.password,
        Role::Member,
        state.config.auth.password_cost,
    ) {
        Ok(id) => id,
        Err(e) if e.is_constraint_violation() => {
            return Err(AppError::bad_request("Username is taken"));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("Registered user {} ({})", form.username, user_id);
    sign_in(&state, user_id)
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let user_id = users::authenticate(&state.db, &form.username, &form.password)?
        .ok_or(AppError::Unauthorized)?;
    sign_in(&state, user_id)
}

/// POST /api/auth/logout
async fn logout(State(state): State<AppState>) -> Response {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(&state.config.auth))],
    )
        .into_response()
}

/// GET /api/auth/checkUsername?username=
async fn check_username(
    State(state): State<AppState>,
    Query(query): Query<UsernameQuery>,
) -> AppResult<Json<Availability>> {
    let available = users::username_available(&state.db, &query.username)?;
    Ok(Json(Availability { available }))
}
