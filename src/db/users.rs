use rusqlite::types::Value;
use rusqlite::{params, Row};

use super::models::{Role, User};
use super::posts::PostSort;
use super::query::{Predicate, Update};
use super::{one, DbResult};
use crate::state::DbPool;

/// Columns for a user embedded as the author of a post or comment, aliased `u`.
pub(crate) const AUTHOR_COLUMNS: &str =
    "u.id, u.username, u.role, u.bio, u.avatar, u.created_at, u.deleted_at IS NOT NULL";

/// Read the author columns starting at `offset`.
pub(crate) fn author_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(offset)?,
        username: row.get(offset + 1)?,
        role: row.get(offset + 2)?,
        bio: row.get(offset + 3)?,
        avatar: row.get(offset + 4)?,
        post_count: None,
        comment_count: None,
        created_at: row.get(offset + 5)?,
        deleted: row.get(offset + 6)?,
    })
}

pub fn create_user(
    pool: &DbPool,
    username: &str,
    password: &str,
    role: Role,
    cost: u32,
) -> DbResult<i64> {
    let hashed = bcrypt::hash(password, cost)?;
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO users (username, password, role) VALUES (?1, ?2, ?3)",
        params![username, hashed, role],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user(pool: &DbPool, user_id: i64) -> DbResult<User> {
    let conn = pool.get()?;
    one(conn.query_row(
        "SELECT u.id, u.username, u.role, u.bio, u.avatar,
                (SELECT COUNT(*) FROM posts p WHERE p.user_id = u.id AND p.deleted_at IS NULL),
                (SELECT COUNT(*) FROM comments c WHERE c.user_id = u.id AND c.deleted_at IS NULL),
                u.created_at, u.deleted_at IS NOT NULL
         FROM users u
         WHERE u.id = ?1",
        params![user_id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                role: row.get(2)?,
                bio: row.get(3)?,
                avatar: row.get(4)?,
                post_count: Some(row.get(5)?),
                comment_count: Some(row.get(6)?),
                created_at: row.get(7)?,
                deleted: row.get(8)?,
            })
        },
    ))
}

/// Optional fields of a profile update; `None` leaves the column untouched.
#[derive(Debug, Default, Clone)]
pub struct UserChanges {
    pub password: Option<String>,
    pub bio: Option<String>,
}

pub fn update_user(pool: &DbPool, user_id: i64, changes: &UserChanges, cost: u32) -> DbResult<()> {
    let mut update = Update::table("users");

    if let Some(ref password) = changes.password {
        update = update.set("password", bcrypt::hash(password, cost)?);
    }
    if let Some(ref bio) = changes.bio {
        update = update.set("bio", bio.clone());
    }

    let conn = pool.get()?;
    update
        .filter(Predicate::Eq("id", Value::Integer(user_id)))
        .execute(&conn)?;
    Ok(())
}

pub fn update_avatar(pool: &DbPool, user_id: i64, avatar: Option<&str>) -> DbResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "UPDATE users SET avatar = ?1 WHERE id = ?2",
        params![avatar, user_id],
    )?;
    Ok(())
}

/// Soft-delete. Returns false if the user was already deleted.
pub fn delete_user(pool: &DbPool, user_id: i64) -> DbResult<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE users SET deleted_at = datetime('now') WHERE id = ?1 AND deleted_at IS NULL",
        params![user_id],
    )?;
    Ok(changed > 0)
}

/// Returns the user id when the credentials match a live account.
pub fn authenticate(pool: &DbPool, username: &str, password: &str) -> DbResult<Option<i64>> {
    let conn = pool.get()?;
    let found = one(conn.query_row(
        "SELECT id, password FROM users WHERE username = ?1 AND deleted_at IS NULL",
        params![username],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    ));

    let (user_id, hash) = match found {
        Ok(found) => found,
        Err(super::DbError::NotFound) => return Ok(None),
        Err(e) => return Err(e),
    };

    if bcrypt::verify(password, &hash)? {
        Ok(Some(user_id))
    } else {
        Ok(None)
    }
}

pub fn username_available(pool: &DbPool, username: &str) -> DbResult<bool> {
    let conn = pool.get()?;
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )?;
    Ok(count == 0)
}

pub fn get_preferences(pool: &DbPool, user_id: i64) -> DbResult<serde_json::Value> {
    let conn = pool.get()?;
    let raw: String = one(conn.query_row(
        "SELECT prefs FROM users WHERE id = ?1",
        params![user_id],
        |row| row.get(0),
    ))?;
    Ok(serde_json::from_str(&raw)?)
}

/// A single preference key with its typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Preference {
    DarkMode(bool),
    ReducedMotion(bool),
    PreferredSort(PostSort),
}

impl Preference {
    /// Parse a `PATCH /me/{key}` request. Boolean keys are true only for the literal `"true"`.
    pub fn parse(key: &str, value: &str) -> Option<Self> {
        match key {
            "prefersDarkMode" => Some(Preference::DarkMode(value == "true")),
            "prefersReducedMotion" => Some(Preference::ReducedMotion(value == "true")),
            "preferredSort" => PostSort::parse(value).map(Preference::PreferredSort),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Preference::DarkMode(_) => "prefersDarkMode",
            Preference::ReducedMotion(_) => "prefersReducedMotion",
            Preference::PreferredSort(_) => "preferredSort",
        }
    }

    fn value(&self) -> serde_json::Value {
        match self {
            Preference::DarkMode(v) | Preference::ReducedMotion(v) => serde_json::Value::Bool(*v),
            Preference::PreferredSort(sort) => serde_json::Value::from(sort.as_str()),
        }
    }
}

/// Set one key of the preferences document, leaving the others intact.
pub fn set_preference(pool: &DbPool, user_id: i64, preference: &Preference) -> DbResult<()> {
    let conn = pool.get()?;
    let value = serde_json::to_string(&preference.value())?;
    conn.execute(
        "UPDATE users SET prefs = json_set(prefs, ?1, json(?2)) WHERE id = ?3",
        params![format!("$.{}", preference.key()), value, user_id],
    )?;
    Ok(())
}
