use rusqlite::params;

use super::models::Reaction;
use super::{one, DbResult};
use crate::state::DbPool;

/// What a reaction is attached to. Each target has its own link table and catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionTarget {
    Post,
    Comment,
}

impl ReactionTarget {
    fn table(&self) -> &'static str {
        match self {
            ReactionTarget::Post => "post_reactions",
            ReactionTarget::Comment => "comment_reactions",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            ReactionTarget::Post => "post_id",
            ReactionTarget::Comment => "comment_id",
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ReactionTarget::Post => "post",
            ReactionTarget::Comment => "comment",
        }
    }
}

/// Insert or replace the user's reaction on the target.
///
/// Returns false when `name` is not in the catalogue for this target type.
pub fn set_reaction(
    pool: &DbPool,
    target: ReactionTarget,
    user_id: i64,
    target_id: i64,
    name: &str,
) -> DbResult<bool> {
    let conn = pool.get()?;
    let sql = format!(
        "INSERT INTO {table} (user_id, {column}, reaction_id)
         SELECT ?1, ?2, r.id FROM reactions r WHERE r.name = ?3 AND r.type = ?4
         ON CONFLICT (user_id, {column}) DO UPDATE SET
           reaction_id = excluded.reaction_id,
           created_at = datetime('now')",
        table = target.table(),
        column = target.column(),
    );
    let changed = conn.execute(&sql, params![user_id, target_id, name, target.kind()])?;
    Ok(changed > 0)
}

pub fn clear_reaction(
    pool: &DbPool,
    target: ReactionTarget,
    user_id: i64,
    target_id: i64,
) -> DbResult<()> {
    let conn = pool.get()?;
    let sql = format!(
        "DELETE FROM {} WHERE user_id = ?1 AND {} = ?2",
        target.table(),
        target.column()
    );
    conn.execute(&sql, params![user_id, target_id])?;
    Ok(())
}

/// Aggregate counts per reaction, most used first.
pub fn list_reactions(
    pool: &DbPool,
    target: ReactionTarget,
    target_id: i64,
) -> DbResult<Vec<Reaction>> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT r.id, r.name, COUNT(*) AS n
         FROM {} x
         JOIN reactions r ON r.id = x.reaction_id
         WHERE x.{} = ?1
         GROUP BY r.id
         ORDER BY n DESC, r.id ASC",
        target.table(),
        target.column()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![target_id], |row| {
        Ok(Reaction {
            id: row.get(0)?,
            name: row.get(1)?,
            count: row.get(2)?,
        })
    })?;

    let mut reactions = Vec::new();
    for row in rows {
        reactions.push(row?);
    }
    Ok(reactions)
}

pub fn get_user_reaction(
    pool: &DbPool,
    target: ReactionTarget,
    user_id: i64,
    target_id: i64,
) -> DbResult<Reaction> {
    let conn = pool.get()?;
    let sql = format!(
        "SELECT r.id, r.name
         FROM {} x
         JOIN reactions r ON r.id = x.reaction_id
         WHERE x.user_id = ?1 AND x.{} = ?2",
        target.table(),
        target.column()
    );
    one(conn.query_row(&sql, params![user_id, target_id], |row| {
        Ok(Reaction {
            id: row.get(0)?,
            name: row.get(1)?,
            count: 1,
        })
    }))
}
