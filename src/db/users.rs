//! User profile persistence.
//!
//! Minimal rows used for ownership scoping and transcript speaker
//! resolution; authentication itself lives outside this service.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    pub created_at: String,
}

pub struct UserRepository;

impl UserRepository {
    /// Insert or refresh a user profile row.
    pub fn upsert(conn: &Connection, id: &str, name: &str, image: Option<&str>) -> Result<()> {
        conn.execute(
            "INSERT INTO users (id, name, image) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, image = excluded.image",
            params![id, name, image],
        )
        .context("Failed to upsert user")?;
        Ok(())
    }

    pub fn get(conn: &Connection, id: &str) -> Result<Option<UserRecord>> {
        let mut stmt = conn
            .prepare("SELECT id, name, image, created_at FROM users WHERE id = ?1")
            .context("Failed to prepare user query")?;

        let mut rows = stmt
            .query_map(params![id], Self::map_row)
            .context("Failed to query user")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Fetch all users whose id appears in `ids` (speaker resolution).
    pub fn get_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<UserRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, image, created_at FROM users WHERE id IN ({})",
            placeholders
        );

        let mut stmt = conn.prepare(&sql).context("Failed to prepare users query")?;
        let refs: Vec<&dyn rusqlite::ToSql> = ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();

        let rows = stmt
            .query_map(refs.as_slice(), Self::map_row)
            .context("Failed to query users by ids")?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
        Ok(UserRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            image: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = setup_db();
        UserRepository::upsert(&conn, "user-1", "Ada", None).unwrap();

        let user = UserRepository::get(&conn, "user-1").unwrap().unwrap();
        assert_eq!(user.name, "Ada");
        assert!(user.image.is_none());
    }

    #[test]
    fn test_upsert_replaces_profile() {
        let conn = setup_db();
        UserRepository::upsert(&conn, "user-1", "Ada", None).unwrap();
        UserRepository::upsert(&conn, "user-1", "Ada Lovelace", Some("https://img/ada.png"))
            .unwrap();

        let user = UserRepository::get(&conn, "user-1").unwrap().unwrap();
        assert_eq!(user.name, "Ada Lovelace");
        assert_eq!(user.image.as_deref(), Some("https://img/ada.png"));
    }

    #[test]
    fn test_get_by_ids() {
        let conn = setup_db();
        UserRepository::upsert(&conn, "user-1", "Ada", None).unwrap();
        UserRepository::upsert(&conn, "user-2", "Grace", None).unwrap();

        let users = UserRepository::get_by_ids(
            &conn,
            &["user-1".to_string(), "user-3".to_string()],
        )
        .unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "user-1");

        assert!(UserRepository::get_by_ids(&conn, &[]).unwrap().is_empty());
    }
}
