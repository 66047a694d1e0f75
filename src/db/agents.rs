//! Agent persistence.
//!
//! CRUD scoped by owning user, plus system-scoped lookups for the webhook
//! lifecycle (which runs with no logged-in user). Raw SQL with rusqlite,
//! same shape as `meetings.rs`.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use super::pagination::{Page, PageParams};

#[derive(Debug, Clone, Serialize)]
pub struct AgentRecord {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub instructions: String,
    pub meeting_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT_COLUMNS: &str = "id, user_id, name, instructions, \
     (SELECT COUNT(*) FROM meetings m WHERE m.agent_id = agents.id) AS meeting_count, \
     created_at, updated_at";

pub struct AgentRepository;

impl AgentRepository {
    /// Insert a new agent owned by `user_id`. Returns the created row.
    pub fn insert(
        conn: &Connection,
        user_id: &str,
        name: &str,
        instructions: &str,
    ) -> Result<AgentRecord> {
        let id = super::new_id();
        let now = super::now();
        conn.execute(
            "INSERT INTO agents (id, user_id, name, instructions, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![id, user_id, name, instructions, now],
        )
        .context("Failed to insert agent")?;

        Self::get_any(conn, &id)?.context("Inserted agent not found")
    }

    /// Get an agent scoped by id and owner.
    pub fn get(conn: &Connection, id: &str, user_id: &str) -> Result<Option<AgentRecord>> {
        Self::query_one(
            conn,
            &format!("SELECT {SELECT_COLUMNS} FROM agents WHERE id = ?1 AND user_id = ?2"),
            params![id, user_id],
        )
    }

    /// System-scoped fetch by id only, used by the lifecycle handler.
    pub fn get_any(conn: &Connection, id: &str) -> Result<Option<AgentRecord>> {
        Self::query_one(
            conn,
            &format!("SELECT {SELECT_COLUMNS} FROM agents WHERE id = ?1"),
            params![id],
        )
    }

    /// Fetch all agents whose id appears in `ids` (speaker resolution).
    pub fn get_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<AgentRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("SELECT {SELECT_COLUMNS} FROM agents WHERE id IN ({placeholders})");

        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare agents by-ids query")?;
        let refs: Vec<&dyn rusqlite::ToSql> =
            ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();

        let rows = stmt
            .query_map(refs.as_slice(), Self::map_row)
            .context("Failed to query agents by ids")?;

        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }
        Ok(agents)
    }

    /// Replace the mutable fields, scoped by id and owner.
    /// Returns the updated row, or `None` if nothing matched.
    pub fn update(
        conn: &Connection,
        id: &str,
        user_id: &str,
        name: &str,
        instructions: &str,
    ) -> Result<Option<AgentRecord>> {
        let changed = conn
            .execute(
                "UPDATE agents SET name = ?1, instructions = ?2, updated_at = ?3
                 WHERE id = ?4 AND user_id = ?5",
                params![name, instructions, super::now(), id, user_id],
            )
            .context("Failed to update agent")?;

        if changed == 0 {
            return Ok(None);
        }
        Self::get(conn, id, user_id)
    }

    /// Delete scoped by id and owner, returning the deleted row's data.
    pub fn delete(conn: &Connection, id: &str, user_id: &str) -> Result<Option<AgentRecord>> {
        let Some(existing) = Self::get(conn, id, user_id)? else {
            return Ok(None);
        };

        conn.execute(
            "DELETE FROM agents WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )
        .context("Failed to delete agent")?;

        Ok(Some(existing))
    }

    /// Paginated list scoped by owner, with optional case-insensitive
    /// substring search on name. Ordered by creation time descending, id
    /// descending as tiebreak for a stable page boundary.
    pub fn list(
        conn: &Connection,
        user_id: &str,
        search: Option<&str>,
        page: PageParams,
    ) -> Result<Page<AgentRecord>> {
        let mut where_sql = "WHERE user_id = ?".to_string();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

        if let Some(q) = search {
            where_sql.push_str(" AND name LIKE ? COLLATE NOCASE");
            args.push(Box::new(format!("%{}%", q)));
        }

        let total: i64 = {
            let sql = format!("SELECT COUNT(*) FROM agents {where_sql}");
            let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
            conn.query_row(&sql, refs.as_slice(), |row| row.get(0))
                .context("Failed to count agents")?
        };

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM agents {where_sql}
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        args.push(Box::new(page.limit()));
        args.push(Box::new(page.offset()));

        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare agents list query")?;
        let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt
            .query_map(refs.as_slice(), Self::map_row)
            .context("Failed to list agents")?;

        let mut agents = Vec::new();
        for row in rows {
            agents.push(row?);
        }

        Ok(Page::new(agents, total, page.page_size))
    }

    fn query_one(
        conn: &Connection,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Option<AgentRecord>> {
        let mut stmt = conn.prepare(sql).context("Failed to prepare agent query")?;
        let mut rows = stmt
            .query_map(args, Self::map_row)
            .context("Failed to query agent")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AgentRecord> {
        Ok(AgentRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            name: row.get(2)?,
            instructions: row.get(3)?,
            meeting_count: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
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

    fn page(n: u32, size: u32) -> PageParams {
        PageParams {
            page: n,
            page_size: size,
        }
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let conn = setup_db();
        let created =
            AgentRepository::insert(&conn, "user-1", "Notetaker", "Take detailed notes.").unwrap();

        let fetched = AgentRepository::get(&conn, &created.id, "user-1")
            .unwrap()
            .unwrap();
        assert_eq!(fetched.name, "Notetaker");
        assert_eq!(fetched.instructions, "Take detailed notes.");
        assert_eq!(fetched.meeting_count, 0);
    }

    #[test]
    fn test_get_is_owner_scoped() {
        let conn = setup_db();
        let created = AgentRepository::insert(&conn, "user-1", "Notetaker", "Notes.").unwrap();

        assert!(AgentRepository::get(&conn, &created.id, "user-2")
            .unwrap()
            .is_none());
        assert!(AgentRepository::get_any(&conn, &created.id)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_update_scoped() {
        let conn = setup_db();
        let created = AgentRepository::insert(&conn, "user-1", "Notetaker", "Notes.").unwrap();

        let updated =
            AgentRepository::update(&conn, &created.id, "user-1", "Scribe", "Write minutes.")
                .unwrap()
                .unwrap();
        assert_eq!(updated.name, "Scribe");

        // Wrong owner sees a not-found sentinel, row untouched.
        assert!(
            AgentRepository::update(&conn, &created.id, "user-2", "Hijack", "x")
                .unwrap()
                .is_none()
        );
        let current = AgentRepository::get(&conn, &created.id, "user-1")
            .unwrap()
            .unwrap();
        assert_eq!(current.name, "Scribe");
    }

    #[test]
    fn test_delete_returns_row() {
        let conn = setup_db();
        let created = AgentRepository::insert(&conn, "user-1", "Notetaker", "Notes.").unwrap();

        let deleted = AgentRepository::delete(&conn, &created.id, "user-1")
            .unwrap()
            .unwrap();
        assert_eq!(deleted.id, created.id);
        assert!(AgentRepository::get_any(&conn, &created.id)
            .unwrap()
            .is_none());
        assert!(AgentRepository::delete(&conn, &created.id, "user-1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_list_search_case_insensitive() {
        let conn = setup_db();
        AgentRepository::insert(&conn, "user-1", "Math Tutor", "Teach.").unwrap();
        AgentRepository::insert(&conn, "user-1", "Spanish Coach", "Habla.").unwrap();
        AgentRepository::insert(&conn, "user-2", "Math Mentor", "Other user.").unwrap();

        let result = AgentRepository::list(&conn, "user-1", Some("math"), page(1, 10)).unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].name, "Math Tutor");
    }

    #[test]
    fn test_list_pagination_no_overlap() {
        let conn = setup_db();
        for i in 0..5 {
            AgentRepository::insert(&conn, "user-1", &format!("Agent {}", i), "x").unwrap();
        }

        let first = AgentRepository::list(&conn, "user-1", None, page(1, 2)).unwrap();
        let second = AgentRepository::list(&conn, "user-1", None, page(2, 2)).unwrap();

        assert_eq!(first.total, 5);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.items.len(), 2);
        assert_eq!(second.items.len(), 2);

        for a in &first.items {
            assert!(second.items.iter().all(|b| b.id != a.id));
        }
    }

    #[test]
    fn test_meeting_count() {
        let conn = setup_db();
        let agent = AgentRepository::insert(&conn, "user-1", "Notetaker", "Notes.").unwrap();
        crate::db::meetings::MeetingRepository::insert(&conn, "user-1", &agent.id, "Standup")
            .unwrap();
        crate::db::meetings::MeetingRepository::insert(&conn, "user-1", &agent.id, "Retro")
            .unwrap();

        let fetched = AgentRepository::get(&conn, &agent.id, "user-1")
            .unwrap()
            .unwrap();
        assert_eq!(fetched.meeting_count, 2);
    }
}
