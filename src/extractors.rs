use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::auth::session::get_cookie_value;
use crate::error::AppError;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
}

/// Extractor that requires authentication.
/// Returns 401 if the session cookie is missing, malformed, expired or badly signed.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = get_cookie_value(parts, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        match state.tokens.verify(token) {
            Ok(claims) => Ok(CurrentUser {
                id: claims.user_id,
            }),
            Err(e) => {
                tracing::debug!("Rejected session token: {}", e);
                Err(AppError::Unauthorized)
            }
        }
    }
}

/// Optional user extractor. Yields None instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}

impl MaybeUser {
    pub fn user(&self) -> Option<&CurrentUser> {
        self.0.as_ref()
    }
}
