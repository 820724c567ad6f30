pub mod comments;
pub mod models;
pub mod posts;
pub mod query;
pub mod reactions;
pub mod tags;
pub mod users;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found")]
    NotFound,

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// True when the statement was rejected by a UNIQUE/CHECK/FK constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DbError::Sql(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Map an empty result set to the `NotFound` sentinel.
pub(crate) fn one<T>(result: rusqlite::Result<T>) -> DbResult<T> {
    match result {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(DbError::NotFound),
        Err(e) => Err(e.into()),
    }
}

fn connection_manager(manager: SqliteConnectionManager) -> SqliteConnectionManager {
    // foreign_keys and busy_timeout are per-connection settings
    manager.with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    })
}

pub fn create_pool(db_path: &Path, config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = connection_manager(SqliteConnectionManager::file(db_path));
    let pool = Pool::builder()
        .max_size(config.max_connections)
        .max_lifetime(Some(Duration::from_secs(config.connection_lifetime_secs)))
        .build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

/// Single-connection in-memory pool. Every connection to `:memory:` is a
/// separate database, so the pool must never hold more than one.
pub fn memory_pool() -> anyhow::Result<DbPool> {
    let manager = connection_manager(SqliteConnectionManager::memory());
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path, &DatabaseConfig::default()).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in [
            "users",
            "posts",
            "comments",
            "tags",
            "post_tags",
            "reactions",
            "post_reactions",
            "comment_reactions",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = testing::pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn reaction_catalogue_is_seeded() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let (posts, comments): (i64, i64) = conn
            .query_row(
                "SELECT SUM(type = 'post'), SUM(type = 'comment') FROM reactions",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(posts, 7);
        assert_eq!(comments, 2);
    }

    #[test]
    fn foreign_keys_enforced() {
        let pool = testing::pool();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO posts (user_id, title, body) VALUES (?1, ?2, ?3)",
            params![999, "title", "hello"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_username_is_a_constraint_violation() {
        let pool = testing::pool();
        testing::user(&pool, "alice");
        let err = users::create_user(&pool, "alice", "password1", models::Role::Member, 4)
            .unwrap_err();
        assert!(err.is_constraint_violation());
    }
}
