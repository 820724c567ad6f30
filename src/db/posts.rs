use rusqlite::types::Value;
use rusqlite::{params, Row};

use super::models::Post;
use super::query::{Order, Page, Predicate, Select, Update};
use super::users::{author_from_row, AUTHOR_COLUMNS};
use super::DbResult;
use crate::state::DbPool;

pub const PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostSort {
    #[default]
    Latest,
    Popular,
    Replies,
}

impl PostSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "latest" => Some(PostSort::Latest),
            "popular" => Some(PostSort::Popular),
            "replies" => Some(PostSort::Replies),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostSort::Latest => "latest",
            PostSort::Popular => "popular",
            PostSort::Replies => "replies",
        }
    }

    fn sort_key(&self) -> &'static str {
        match self {
            PostSort::Latest => "p.created_at",
            PostSort::Popular => "reaction_count",
            PostSort::Replies => "comment_count",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PostFilter {
    NotDeleted,
    Author(String),
    Tag(i64),
    /// Substring of the title or the body.
    Search(String),
}

impl PostFilter {
    fn into_predicate(self) -> Predicate {
        match self {
            PostFilter::NotDeleted => Predicate::IsNull("p.deleted_at"),
            PostFilter::Author(username) => Predicate::Eq("u.username", Value::Text(username)),
            PostFilter::Tag(tag_id) => Predicate::Member(
                "p.id",
                "SELECT pt.post_id FROM post_tags pt WHERE pt.tag_id = ?",
                Value::Integer(tag_id),
            ),
            PostFilter::Search(needle) => Predicate::Contains(&["p.title", "p.body"], needle),
        }
    }
}

fn select_posts() -> Select {
    Select::new(format!(
        "SELECT p.id, p.title, p.body, {AUTHOR_COLUMNS},
                (SELECT COUNT(*) FROM comments c
                  WHERE c.post_id = p.id AND c.deleted_at IS NULL) AS comment_count,
                (SELECT COUNT(*) FROM post_reactions pr WHERE pr.post_id = p.id) AS reaction_count,
                COALESCE((SELECT GROUP_CONCAT(pt.tag_id) FROM post_tags pt
                  WHERE pt.post_id = p.id), '') AS tags,
                p.created_at, p.updated_at, p.deleted_at IS NOT NULL
         FROM posts p
         JOIN users u ON u.id = p.user_id"
    ))
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        author: author_from_row(row, 3)?,
        comment_count: row.get(10)?,
        tags: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        deleted: row.get(15)?,
    })
}

pub fn create_post(pool: &DbPool, user_id: i64, title: &str, body: &str) -> DbResult<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO posts (title, body, user_id) VALUES (?1, ?2, ?3)",
        params![title, body, user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// One page of posts ordered by `sort` descending, ties broken by id ascending.
pub fn list_posts(
    pool: &DbPool,
    filters: Vec<PostFilter>,
    sort: PostSort,
    page: Page,
) -> DbResult<Vec<Post>> {
    let conn = pool.get()?;
    select_posts()
        .filters(filters.into_iter().map(PostFilter::into_predicate))
        .order_by(sort.sort_key(), Order::Desc)
        .order_by("p.id", Order::Asc)
        .page(page)
        .fetch_all(&conn, post_from_row)
}

pub fn get_post(pool: &DbPool, post_id: i64) -> DbResult<Post> {
    let conn = pool.get()?;
    select_posts()
        .filter(Predicate::Eq("p.id", Value::Integer(post_id)))
        .fetch_one(&conn, post_from_row)
}

/// Returns false if the post is missing or already deleted.
pub fn update_post(pool: &DbPool, post_id: i64, title: &str, body: &str) -> DbResult<bool> {
    let conn = pool.get()?;
    let changed = Update::table("posts")
        .set("title", title.to_string())
        .set("body", body.to_string())
        .touch("updated_at")
        .filter(Predicate::Eq("id", Value::Integer(post_id)))
        .filter(Predicate::IsNull("deleted_at"))
        .execute(&conn)?;
    Ok(changed > 0)
}

/// Soft-delete. Returns false if the post was already deleted.
pub fn delete_post(pool: &DbPool, post_id: i64) -> DbResult<bool> {
    let conn = pool.get()?;
    let changed = conn.execute(
        "UPDATE posts SET deleted_at = datetime('now') WHERE id = ?1 AND deleted_at IS NULL",
        params![post_id],
    )?;
    Ok(changed > 0)
}
