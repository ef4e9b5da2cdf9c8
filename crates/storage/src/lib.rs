use anyhow::{anyhow, Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use shared::domain::{Breed, Character, Group, GroupId};

const FOCUS_KEY: &str = "focus";

/// SQLite-backed store for the character pool, the ordered groups and the
/// active focus.
///
/// Groups are addressed by [`GroupId`], their position in display order.
/// Member breeds are always read from the pool, so a breed change is visible
/// in every group that contains the character.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // every connection to `sqlite::memory:` is a separate database
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn list_characters(&self) -> Result<Vec<Character>> {
        let rows = sqlx::query("SELECT name, breed FROM characters ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(Character {
                    name: row.get::<String, _>("name"),
                    breed: decode_breed(row)?,
                    enabled: true,
                })
            })
            .collect()
    }

    /// Adds `name` to the pool with no breed. Returns `false` when it was already known.
    pub async fn register_character(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("INSERT OR IGNORE INTO characters (name, breed) VALUES (?, NULL)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn set_breed(&self, name: &str, breed: Breed) -> Result<()> {
        sqlx::query(
            "INSERT INTO characters (name, breed) VALUES (?, ?)
             ON CONFLICT(name) DO UPDATE SET breed = excluded.breed",
        )
        .bind(name)
        .bind(breed.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query("SELECT id, name FROM groups ORDER BY position")
            .fetch_all(&self.pool)
            .await?;
        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let row_id = row.get::<i64, _>("id");
            groups.push(Group {
                name: row.get::<String, _>("name"),
                characters: self.members_for_row(row_id).await?,
            });
        }
        Ok(groups)
    }

    pub async fn group_count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM groups")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Inserts an empty group at the front of the collection.
    ///
    /// Returns `false`, leaving every group in place, when the name is taken.
    pub async fn create_group(&self, name: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE groups SET position = position + 1")
            .execute(&mut *tx)
            .await?;
        let inserted = sqlx::query("INSERT INTO groups (name, position) VALUES (?, 0)")
            .bind(name)
            .execute(&mut *tx)
            .await;
        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => return Ok(false),
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("failed to insert group '{name}'")))
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Deletes the group at `id` and closes the gap in positions. Returns `false` if absent.
    pub async fn delete_group(&self, id: GroupId) -> Result<bool> {
        let Some(row_id) = self.group_row_id(id).await? else {
            return Ok(false);
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(row_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE groups SET position = position - 1 WHERE position > ?")
            .bind(id.0 as i64)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Membership of the group at `id`, or `None` when there is no such group.
    pub async fn members(&self, id: GroupId) -> Result<Option<Vec<Character>>> {
        match self.group_row_id(id).await? {
            Some(row_id) => Ok(Some(self.members_for_row(row_id).await?)),
            None => Ok(None),
        }
    }

    /// Rewrites the whole membership sequence of the group at `id`.
    ///
    /// Names missing from the pool are registered. The `breed` of each record
    /// is ignored; it lives in the pool.
    pub async fn replace_members(&self, id: GroupId, members: &[Character]) -> Result<()> {
        let row_id = self
            .group_row_id(id)
            .await?
            .ok_or_else(|| anyhow!("group {} does not exist", id.0))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM group_members WHERE group_id = ?")
            .bind(row_id)
            .execute(&mut *tx)
            .await?;

        for (position, member) in members.iter().enumerate() {
            sqlx::query("INSERT OR IGNORE INTO characters (name, breed) VALUES (?, NULL)")
                .bind(&member.name)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO group_members (group_id, position, name, enabled) VALUES (?, ?, ?, ?)",
            )
            .bind(row_id)
            .bind(position as i64)
            .bind(&member.name)
            .bind(member.enabled)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to store member '{}'", member.name))?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn focus(&self) -> Result<GroupId> {
        let value: Option<i64> = sqlx::query_scalar("SELECT value FROM app_state WHERE key = ?")
            .bind(FOCUS_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(GroupId(
            value
                .and_then(|value| usize::try_from(value).ok())
                .unwrap_or_default(),
        ))
    }

    pub async fn set_focus(&self, id: GroupId) -> Result<()> {
        sqlx::query(
            "INSERT INTO app_state (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(FOCUS_KEY)
        .bind(id.0 as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn group_row_id(&self, id: GroupId) -> Result<Option<i64>> {
        let row_id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM groups ORDER BY position LIMIT 1 OFFSET ?")
                .bind(id.0 as i64)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row_id)
    }

    async fn members_for_row(&self, row_id: i64) -> Result<Vec<Character>> {
        let rows = sqlx::query(
            "SELECT m.name, m.enabled, c.breed
             FROM group_members m
             LEFT JOIN characters c ON c.name = m.name
             WHERE m.group_id = ?
             ORDER BY m.position",
        )
        .bind(row_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(Character {
                    name: row.get::<String, _>("name"),
                    breed: decode_breed(row)?,
                    enabled: row.get::<bool, _>("enabled"),
                })
            })
            .collect()
    }
}

fn decode_breed(row: &SqliteRow) -> Result<Option<Breed>> {
    row.get::<Option<String>, _>("breed")
        .map(|raw| Breed::from_str(&raw).with_context(|| format!("corrupt breed column '{raw}'")))
        .transpose()
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
