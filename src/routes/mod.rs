pub mod auth;
pub mod comments;
pub mod me;
pub mod posts;
pub mod reactions;
pub mod tags;
pub mod users;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::db::query::Page;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::state::AppState;

/// The full application: the JSON API under `/api` and uploaded files under `/uploads`.
pub fn app(state: AppState) -> Router {
    let uploads = ServeDir::new(state.config.uploads_path());

    let api = Router::new()
        .merge(auth::router())
        .merge(me::router())
        .merge(users::router(state.config.storage.max_upload_bytes))
        .merge(posts::router())
        .merge(comments::router())
        .merge(reactions::router())
        .merge(tags::router())
        .nest_service("/uploads", uploads);

    with_middleware(api).with_state(state)
}

/// A panicking handler answers 500 instead of dropping the connection.
fn with_middleware<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

/// A missing `page` means the first page; anything else must be an integer >= 1.
pub(crate) fn parse_page(raw: Option<&str>, size: i64) -> AppResult<Page> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(Page::first(size)),
        Some(raw) => raw
            .parse()
            .ok()
            .and_then(|n| Page::new(n, size))
            .ok_or_else(|| AppError::bad_request("Invalid page")),
    }
}

/// Creation endpoints only need a signed-in actor, checked after input validation.
pub(crate) fn require_user(user: MaybeUser) -> AppResult<CurrentUser> {
    user.0.ok_or(AppError::Unauthorized)
}
