pub mod session;
pub mod token;

use crate::db::models::Role;
use crate::db::users;
use crate::extractors::CurrentUser;
use crate::state::DbPool;

pub use token::{Claims, TokenError, TokenService};

/// Self-or-admin rule: the actor may act on `target`'s resources if they are
/// `target`, or if their stored role is admin. Anonymous actors never pass,
/// and a failed role lookup counts as a refusal.
pub fn check_user_id(db: &DbPool, actor: Option<&CurrentUser>, target: i64) -> bool {
    let Some(actor) = actor else {
        return false;
    };
    if actor.id == target {
        return true;
    }

    match users::get_user(db, actor.id) {
        Ok(user) => user.role == Role::Admin && !user.deleted,
        Err(e) => {
            tracing::warn!("Role lookup for user {} failed: {}", actor.id, e);
            false
        }
    }
}

/// Admin-only actions: no user owns the resource, so only the role can grant access.
pub fn require_admin(db: &DbPool, actor: Option<&CurrentUser>) -> bool {
    check_user_id(db, actor, 0)
}
