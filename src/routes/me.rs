use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::users::{self, Preference};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

#[derive(Serialize)]
pub struct Me {
    pub id: i64,
    pub prefs: serde_json::Value,
}

#[derive(Deserialize)]
pub struct PreferenceForm {
    #[serde(default)]
    pub value: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/me/{key}", patch(update_preference))
}

/// GET /api/me
async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Me>> {
    let prefs = users::get_preferences(&state.db, user.id)?;
    Ok(Json(Me { id: user.id, prefs }))
}

/// PATCH /api/me/{key}
async fn update_preference(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(key): Path<String>,
    Form(form): Form<PreferenceForm>,
) -> AppResult<StatusCode> {
    let preference = Preference::parse(&key, &form.value)
        .ok_or_else(|| AppError::bad_request(format!("Invalid preference {key}")))?;
    users::set_preference(&state.db, user.id, &preference)?;
    Ok(StatusCode::NO_CONTENT)
}
