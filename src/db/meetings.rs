//! Meeting persistence.
//!
//! Owner-scoped CRUD plus the system-scoped lookups and guarded status
//! transitions the webhook lifecycle relies on. A guarded update
//! compare-and-sets on the expected current status in a single statement,
//! so a stale or duplicate event degrades to a rejected no-op.

use anyhow::{Context, Result};
use chrono::DateTime;
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::meeting::{MeetingStatus, Transition};

use super::agents::AgentRecord;
use super::pagination::{Page, PageParams};

#[derive(Debug, Clone, Serialize)]
pub struct MeetingRecord {
    pub id: String,
    pub user_id: String,
    pub agent_id: String,
    pub name: String,
    pub status: MeetingStatus,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub transcript_url: Option<String>,
    pub recording_url: Option<String>,
    pub summary: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MeetingRecord {
    /// Seconds between start and end, `None` while either bound is unset.
    pub fn duration_seconds(&self) -> Option<i64> {
        let started = DateTime::parse_from_rfc3339(self.started_at.as_deref()?).ok()?;
        let ended = DateTime::parse_from_rfc3339(self.ended_at.as_deref()?).ok()?;
        Some((ended - started).num_seconds())
    }
}

/// A meeting joined with its agent, as returned by owner-facing reads.
#[derive(Debug, Serialize)]
pub struct MeetingWithAgent {
    #[serde(flatten)]
    pub meeting: MeetingRecord,
    pub agent: AgentRecord,
    pub duration_seconds: Option<i64>,
}

const MEETING_COLUMNS: &str = "meetings.id, meetings.user_id, meetings.agent_id, meetings.name, \
     meetings.status, meetings.started_at, meetings.ended_at, meetings.transcript_url, \
     meetings.recording_url, meetings.summary, meetings.created_at, meetings.updated_at";

const AGENT_COLUMNS: &str = "agents.id, agents.user_id, agents.name, agents.instructions, \
     (SELECT COUNT(*) FROM meetings m WHERE m.agent_id = agents.id), \
     agents.created_at, agents.updated_at";

pub struct MeetingRepository;

impl MeetingRepository {
    /// Insert a new upcoming meeting owned by `user_id`.
    pub fn insert(
        conn: &Connection,
        user_id: &str,
        agent_id: &str,
        name: &str,
    ) -> Result<MeetingRecord> {
        let id = super::new_id();
        let now = super::now();
        conn.execute(
            "INSERT INTO meetings (id, user_id, agent_id, name, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![id, user_id, agent_id, name, MeetingStatus::Upcoming.as_str(), now],
        )
        .context("Failed to insert meeting")?;

        Self::get_any(conn, &id)?.context("Inserted meeting not found")
    }

    /// System-scoped fetch by id only.
    pub fn get_any(conn: &Connection, id: &str) -> Result<Option<MeetingRecord>> {
        Self::query_one(
            conn,
            &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE meetings.id = ?1"),
            params![id],
        )
    }

    /// System-scoped fetch requiring a specific current status. Used by the
    /// lifecycle handler, which has no logged-in user.
    pub fn get_by_id_and_status(
        conn: &Connection,
        id: &str,
        status: MeetingStatus,
    ) -> Result<Option<MeetingRecord>> {
        Self::query_one(
            conn,
            &format!(
                "SELECT {MEETING_COLUMNS} FROM meetings
                 WHERE meetings.id = ?1 AND meetings.status = ?2"
            ),
            params![id, status.as_str()],
        )
    }

    /// Owner-scoped fetch joined with the agent row.
    pub fn get_with_agent(
        conn: &Connection,
        id: &str,
        user_id: &str,
    ) -> Result<Option<MeetingWithAgent>> {
        let sql = format!(
            "SELECT {MEETING_COLUMNS}, {AGENT_COLUMNS} FROM meetings
             INNER JOIN agents ON agents.id = meetings.agent_id
             WHERE meetings.id = ?1 AND meetings.user_id = ?2"
        );

        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare meeting query")?;
        let mut rows = stmt
            .query_map(params![id, user_id], Self::map_joined_row)
            .context("Failed to query meeting")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Replace the mutable fields (name, agent), scoped by id and owner.
    pub fn update(
        conn: &Connection,
        id: &str,
        user_id: &str,
        name: &str,
        agent_id: &str,
    ) -> Result<Option<MeetingRecord>> {
        let changed = conn
            .execute(
                "UPDATE meetings SET name = ?1, agent_id = ?2, updated_at = ?3
                 WHERE id = ?4 AND user_id = ?5",
                params![name, agent_id, super::now(), id, user_id],
            )
            .context("Failed to update meeting")?;

        if changed == 0 {
            return Ok(None);
        }
        Self::get_any(conn, id)
    }

    /// Delete scoped by id and owner, returning the deleted row's data.
    pub fn delete(conn: &Connection, id: &str, user_id: &str) -> Result<Option<MeetingRecord>> {
        let Some(existing) = Self::query_one(
            conn,
            &format!(
                "SELECT {MEETING_COLUMNS} FROM meetings
                 WHERE meetings.id = ?1 AND meetings.user_id = ?2"
            ),
            params![id, user_id],
        )?
        else {
            return Ok(None);
        };

        conn.execute(
            "DELETE FROM meetings WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )
        .context("Failed to delete meeting")?;

        Ok(Some(existing))
    }

    /// Paginated owner-scoped list with optional name search, status filter
    /// and agent filter. Stable ordering: created_at desc, id desc.
    pub fn list(
        conn: &Connection,
        user_id: &str,
        search: Option<&str>,
        status: Option<MeetingStatus>,
        agent_id: Option<&str>,
        page: PageParams,
    ) -> Result<Page<MeetingWithAgent>> {
        let mut where_sql = "WHERE meetings.user_id = ?".to_string();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(user_id.to_string())];

        if let Some(q) = search {
            where_sql.push_str(" AND meetings.name LIKE ? COLLATE NOCASE");
            args.push(Box::new(format!("%{}%", q)));
        }
        if let Some(s) = status {
            where_sql.push_str(" AND meetings.status = ?");
            args.push(Box::new(s.as_str().to_string()));
        }
        if let Some(a) = agent_id {
            where_sql.push_str(" AND meetings.agent_id = ?");
            args.push(Box::new(a.to_string()));
        }

        let total: i64 = {
            let sql = format!("SELECT COUNT(*) FROM meetings {where_sql}");
            let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
            conn.query_row(&sql, refs.as_slice(), |row| row.get(0))
                .context("Failed to count meetings")?
        };

        let sql = format!(
            "SELECT {MEETING_COLUMNS}, {AGENT_COLUMNS} FROM meetings
             INNER JOIN agents ON agents.id = meetings.agent_id
             {where_sql}
             ORDER BY meetings.created_at DESC, meetings.id DESC LIMIT ? OFFSET ?"
        );
        args.push(Box::new(page.limit()));
        args.push(Box::new(page.offset()));

        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare meetings list query")?;
        let refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|a| a.as_ref()).collect();
        let rows = stmt
            .query_map(refs.as_slice(), Self::map_joined_row)
            .context("Failed to list meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }

        Ok(Page::new(meetings, total, page.page_size))
    }

    /// Guarded `Upcoming → Active`, stamping the start time.
    pub fn mark_active(conn: &Connection, id: &str) -> Result<Transition> {
        let now = super::now();
        let changed = conn
            .execute(
                "UPDATE meetings SET status = ?1, started_at = ?2, updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![
                    MeetingStatus::Active.as_str(),
                    now,
                    id,
                    MeetingStatus::Upcoming.as_str()
                ],
            )
            .context("Failed to mark meeting active")?;

        Ok(Self::transition(changed))
    }

    /// Guarded `Active → Processing`, stamping the end time.
    pub fn mark_processing(conn: &Connection, id: &str) -> Result<Transition> {
        let now = super::now();
        let changed = conn
            .execute(
                "UPDATE meetings SET status = ?1, ended_at = ?2, updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![
                    MeetingStatus::Processing.as_str(),
                    now,
                    id,
                    MeetingStatus::Active.as_str()
                ],
            )
            .context("Failed to mark meeting processing")?;

        Ok(Self::transition(changed))
    }

    /// Guarded `Processing → Completed`, storing the generated summary.
    pub fn complete_with_summary(conn: &Connection, id: &str, summary: &str) -> Result<Transition> {
        let changed = conn
            .execute(
                "UPDATE meetings SET status = ?1, summary = ?2, updated_at = ?3
                 WHERE id = ?4 AND status = ?5",
                params![
                    MeetingStatus::Completed.as_str(),
                    summary,
                    super::now(),
                    id,
                    MeetingStatus::Processing.as_str()
                ],
            )
            .context("Failed to complete meeting")?;

        Ok(Self::transition(changed))
    }

    /// Owner-scoped guarded `Upcoming → Cancelled`.
    pub fn cancel(conn: &Connection, id: &str, user_id: &str) -> Result<Transition> {
        let changed = conn
            .execute(
                "UPDATE meetings SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND user_id = ?4 AND status = ?5",
                params![
                    MeetingStatus::Cancelled.as_str(),
                    super::now(),
                    id,
                    user_id,
                    MeetingStatus::Upcoming.as_str()
                ],
            )
            .context("Failed to cancel meeting")?;

        Ok(Self::transition(changed))
    }

    /// Store the transcript URL unconditionally. Returns whether a row matched.
    pub fn set_transcript_url(conn: &Connection, id: &str, url: &str) -> Result<bool> {
        let changed = conn
            .execute(
                "UPDATE meetings SET transcript_url = ?1, updated_at = ?2 WHERE id = ?3",
                params![url, super::now(), id],
            )
            .context("Failed to set transcript URL")?;
        Ok(changed > 0)
    }

    /// Store the recording URL unconditionally. Returns whether a row matched.
    pub fn set_recording_url(conn: &Connection, id: &str, url: &str) -> Result<bool> {
        let changed = conn
            .execute(
                "UPDATE meetings SET recording_url = ?1, updated_at = ?2 WHERE id = ?3",
                params![url, super::now(), id],
            )
            .context("Failed to set recording URL")?;
        Ok(changed > 0)
    }

    fn transition(changed: usize) -> Transition {
        if changed > 0 {
            Transition::Applied
        } else {
            Transition::Rejected
        }
    }

    fn query_one(
        conn: &Connection,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Option<MeetingRecord>> {
        let mut stmt = conn
            .prepare(sql)
            .context("Failed to prepare meeting query")?;
        let mut rows = stmt
            .query_map(args, |row| Self::map_row(row, 0))
            .context("Failed to query meeting")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn map_row(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<MeetingRecord> {
        let status_str: String = row.get(base + 4)?;
        let status =
            MeetingStatus::parse(&status_str).map_err(|_| rusqlite::Error::InvalidQuery)?;

        Ok(MeetingRecord {
            id: row.get(base)?,
            user_id: row.get(base + 1)?,
            agent_id: row.get(base + 2)?,
            name: row.get(base + 3)?,
            status,
            started_at: row.get(base + 5)?,
            ended_at: row.get(base + 6)?,
            transcript_url: row.get(base + 7)?,
            recording_url: row.get(base + 8)?,
            summary: row.get(base + 9)?,
            created_at: row.get(base + 10)?,
            updated_at: row.get(base + 11)?,
        })
    }

    fn map_joined_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MeetingWithAgent> {
        let meeting = Self::map_row(row, 0)?;
        let agent = AgentRecord {
            id: row.get(12)?,
            user_id: row.get(13)?,
            name: row.get(14)?,
            instructions: row.get(15)?,
            meeting_count: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        };
        let duration_seconds = meeting.duration_seconds();

        Ok(MeetingWithAgent {
            meeting,
            agent,
            duration_seconds,
        })
    }
}
