use rusqlite::types::Value;
use rusqlite::{params, Row};

use super::models::Tag;
use super::query::{Order, Page, Predicate, Select, Update};
use super::{one, DbResult};
use crate::state::DbPool;

pub const PAGE_SIZE: i64 = 5;
pub const TRENDING_PAGE_SIZE: i64 = 10;

/// Candidates beyond this many are ignored when tagging a post.
pub const MAX_TAGS_PER_POST: usize = 3;
pub const MAX_TAG_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub enum TagFilter {
    NameContains(String),
    /// Only count posts created within the last month.
    Trending,
}

impl TagFilter {
    fn into_predicate(self) -> Predicate {
        match self {
            TagFilter::NameContains(needle) => Predicate::Contains(&["t.name"], needle),
            TagFilter::Trending => Predicate::Since("p.created_at", "-1 month"),
        }
    }
}

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        description: row.get(3)?,
    })
}

/// Create the tag if it does not exist yet and return its id either way.
pub fn create_tag(pool: &DbPool, name: &str) -> DbResult<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO tags (name) VALUES (?1) ON CONFLICT (name) DO NOTHING",
        params![name],
    )?;
    one(conn.query_row(
        "SELECT id FROM tags WHERE name = ?1",
        params![name],
        |row| row.get(0),
    ))
}

/// Link an existing tag to a post by name. Linking twice is a no-op.
pub fn attach_tag(pool: &DbPool, post_id: i64, name: &str) -> DbResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT OR IGNORE INTO post_tags (post_id, tag_id)
         SELECT ?1, id FROM tags WHERE name = ?2",
        params![post_id, name],
    )?;
    Ok(())
}

/// Tags ranked by how many live posts use them, ties broken by id ascending.
pub fn list_tags(pool: &DbPool, filters: Vec<TagFilter>, page: Page) -> DbResult<Vec<Tag>> {
    let conn = pool.get()?;
    Select::new(
        "SELECT t.id, t.name, t.color, t.description
         FROM tags t
         LEFT JOIN post_tags pt ON pt.tag_id = t.id
         LEFT JOIN posts p ON p.id = pt.post_id AND p.deleted_at IS NULL",
    )
    .filters(filters.into_iter().map(TagFilter::into_predicate))
    .group_by("t.id")
    .order_by("COUNT(p.id)", Order::Desc)
    .order_by("t.id", Order::Asc)
    .page(page)
    .fetch_all(&conn, tag_from_row)
}

pub fn get_tag(pool: &DbPool, tag_id: i64) -> DbResult<Tag> {
    let conn = pool.get()?;
    Select::new("SELECT t.id, t.name, t.color, t.description FROM tags t")
        .filter(Predicate::Eq("t.id", Value::Integer(tag_id)))
        .fetch_one(&conn, tag_from_row)
}

/// Name is immutable; only the presentation fields change.
pub fn update_tag(pool: &DbPool, tag_id: i64, color: &str, description: &str) -> DbResult<()> {
    let conn = pool.get()?;
    Update::table("tags")
        .set("color", color.to_string())
        .set("description", description.to_string())
        .filter(Predicate::Eq("id", Value::Integer(tag_id)))
        .execute(&conn)?;
    Ok(())
}

/// Split a comma-separated `tags` field into valid tag names.
///
/// Only the first three candidates are looked at. Each is trimmed and kept
/// when it is 1 to 32 bytes of lowercase letters and hyphens, starting with
/// a letter. Anything else is dropped without error.
pub fn parse_tag_candidates(raw: &str) -> Vec<String> {
    raw.splitn(MAX_TAGS_PER_POST + 1, ',')
        .take(MAX_TAGS_PER_POST)
        .map(str::trim)
        .filter(|name| is_valid_tag(name))
        .map(str::to_string)
        .collect()
}

fn is_valid_tag(name: &str) -> bool {
    let starts_with_letter = name.bytes().next().is_some_and(|b| b.is_ascii_lowercase());
    starts_with_letter
        && name.len() <= MAX_TAG_LEN
        && name.bytes().all(|b| b.is_ascii_lowercase() || b == b'-')
}
