use rusqlite::types::Value;
use rusqlite::{params, Row};

use super::models::Comment;
use super::query::{Order, Page, Predicate, Select, Update};
use super::users::{author_from_row, AUTHOR_COLUMNS};
use super::DbResult;
use crate::state::DbPool;

pub const PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum CommentFilter {
    NotDeleted,
    Post(i64),
    Author(String),
}

impl CommentFilter {
    fn into_predicate(self) -> Predicate {
        match self {
            CommentFilter::NotDeleted => Predicate::IsNull("c.deleted_at"),
            CommentFilter::Post(post_id) => Predicate::Eq("c.post_id", Value::Integer(post_id)),
            CommentFilter::Author(username) => Predicate::Eq("u.username", Value::Text(username)),
        }
    }
}

fn select_comments() -> Select {
    Select::new(format!(
        "SELECT c.id, c.post_id, c.body, {AUTHOR_COLUMNS},
                c.created_at, c.updated_at, c.deleted_at IS NOT NULL
         FROM comments c
         JOIN users u ON u.id = c.user_id"
    ))
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        body: row.get(2)?,
        author: author_from_row(row, 3)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        deleted: row.get(12)?,
    })
}

pub fn create_comment(pool: &DbPool, user_id: i64, post_id: i64, body: &str) -> DbResult<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO comments (user_id, post_id, body) VALUES (?1, ?2, ?3)",
        params![user_id, post_id, body],
    )?;
    Ok(conn.last_insert_rowid())
}

/// One page of comments, newest first, ties broken by id ascending.
pub fn list_comments(pool: &DbPool, filters: Vec<CommentFilter>, page: Page) -> DbResult<Vec<Comment>> {
    let conn = pool.get()?;
    select_comments()
        .filters(filters.into_iter().map(CommentFilter::into_predicate))
        .order_by("c.created_at", Order::Desc)
        .order_by("c.id", Order::Asc)
        .page(page)
        .fetch_all(&conn, comment_from_row)
}

pub fn get_comment(pool: &DbPool, comment_id: i64) -> DbResult<Comment> {
    let conn = pool.get()?;
    select_comments()
        .filter(Predicate::Eq("c.id", Value::Integer(comment_id)))
        .fetch_one(&conn, comment_from_row)
}

/// Returns false if the comment is missing or already deleted.
pub fn update_comment(pool: &DbPool, comment_id: i64, body: &str) -> DbResult<bool> {
    let conn = pool.get()?;
    let changed = Update::table("comments")
        .set("body", body.to_string())
        .touch("updated_at")
        .filter(Predicate::Eq("id", Value::Integer(comment_id)))
        .filter(Predicate::IsNull("deleted_at"))
        .execute(&conn)?;
    Ok(changed > 0)
}

/// Soft-delete. Returns false if the comment was already deleted.
pub fn delete_comment(pool: &DbPool, comment_id: i64) -> DbResult<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE comments SET deleted_at = datetime('now') WHERE id = ?1 AND deleted_at IS NULL",
        params![comment_id],
    )?;
    Ok(changed > 0)
}
