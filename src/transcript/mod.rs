//! Transcript parsing and speaker annotation.
//!
//! Transcripts arrive as newline-delimited JSON, one record per speech
//! turn. Entries are never persisted; they are fetched, parsed, and
//! enriched with display names at read time by cross-referencing the
//! speaker id against both the user and agent tables.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::avatar::{generate_avatar_uri, AvatarVariant};
use crate::db::agents::AgentRepository;
use crate::db::users::UserRepository;

/// One speech turn from the platform's transcript file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub start_ts: i64,
    pub stop_ts: i64,
}

/// Resolved display identity for a speech turn.
#[derive(Debug, Clone, Serialize)]
pub struct Speaker {
    pub name: String,
    pub image: String,
}

#[derive(Debug, Serialize)]
pub struct AnnotatedEntry {
    #[serde(flatten)]
    pub entry: TranscriptEntry,
    pub speaker: Speaker,
}

/// Parse newline-delimited JSON transcript records. Blank lines are
/// skipped; a malformed record is an error.
pub fn parse_jsonl(raw: &str) -> Result<Vec<TranscriptEntry>> {
    let mut entries = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: TranscriptEntry = serde_json::from_str(line)
            .with_context(|| format!("Invalid transcript record on line {}", index + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Annotate each entry with the resolved speaker, looking the unique
/// speaker ids up in both the user and agent tables. Unresolvable ids get
/// an "Unknown" identity with a generated avatar.
pub fn annotate(conn: &Connection, entries: Vec<TranscriptEntry>) -> Result<Vec<AnnotatedEntry>> {
    let mut speaker_ids: Vec<String> = entries.iter().map(|e| e.speaker_id.clone()).collect();
    speaker_ids.sort();
    speaker_ids.dedup();

    let mut speakers: HashMap<String, Speaker> = HashMap::new();

    for user in UserRepository::get_by_ids(conn, &speaker_ids)? {
        let image = user
            .image
            .clone()
            .unwrap_or_else(|| generate_avatar_uri(&user.name, AvatarVariant::Initials));
        speakers.insert(
            user.id,
            Speaker {
                name: user.name,
                image,
            },
        );
    }

    for agent in AgentRepository::get_by_ids(conn, &speaker_ids)? {
        let image = generate_avatar_uri(&agent.name, AvatarVariant::BotttsNeutral);
        speakers.insert(
            agent.id,
            Speaker {
                name: agent.name,
                image,
            },
        );
    }

    debug!(
        "Resolved {} of {} transcript speakers",
        speakers.len(),
        speaker_ids.len()
    );

    Ok(entries
        .into_iter()
        .map(|entry| {
            let speaker = speakers.get(&entry.speaker_id).cloned().unwrap_or_else(|| Speaker {
                name: "Unknown".to_string(),
                image: generate_avatar_uri("unknown", AvatarVariant::Initials),
            });
            AnnotatedEntry { entry, speaker }
        })
        .collect())
}

/// Render annotated entries as readable "Name: text" lines for
/// summarization.
pub fn render_text(entries: &[AnnotatedEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}: {}", e.speaker.name, e.entry.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fetch the raw transcript body from the platform's storage URL.
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to fetch transcript")?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("Transcript fetch failed with status {}", status);
    }

    response
        .text()
        .await
        .context("Failed to read transcript body")
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

    fn entry(speaker: &str, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            speaker_id: speaker.to_string(),
            kind: "speech".to_string(),
            text: text.to_string(),
            start_ts: 0,
            stop_ts: 1000,
        }
    }

    #[test]
    fn test_parse_jsonl() {
        let raw = concat!(
            r#"{"speaker_id":"user-1","type":"speech","text":"hello","start_ts":0,"stop_ts":900}"#,
            "\n\n",
            r#"{"speaker_id":"agent-1","type":"speech","text":"hi","start_ts":1000,"stop_ts":1500}"#,
            "\n",
        );

        let entries = parse_jsonl(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].speaker_id, "user-1");
        assert_eq!(entries[1].text, "hi");
        assert_eq!(entries[1].start_ts, 1000);
    }

    #[test]
    fn test_parse_jsonl_rejects_malformed_line() {
        let raw = "not json\n";
        let err = parse_jsonl(raw).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_jsonl_empty() {
        assert!(parse_jsonl("").unwrap().is_empty());
    }

    #[test]
    fn test_annotate_resolves_agents_and_users() {
        let conn = setup_db();
        UserRepository::upsert(&conn, "user-1", "Ada", Some("https://img/ada.png")).unwrap();
        let agent = AgentRepository::insert(&conn, "user-1", "Notetaker", "Notes.").unwrap();

        let entries = vec![
            entry("user-1", "hello"),
            entry(&agent.id, "hi there"),
            entry("ghost", "who am I"),
        ];

        let annotated = annotate(&conn, entries).unwrap();
        assert_eq!(annotated[0].speaker.name, "Ada");
        assert_eq!(annotated[0].speaker.image, "https://img/ada.png");
        // Agent resolves to its name, not "Unknown".
        assert_eq!(annotated[1].speaker.name, "Notetaker");
        assert!(annotated[1].speaker.image.contains("bottts-neutral"));
        assert_eq!(annotated[2].speaker.name, "Unknown");
    }

    #[test]
    fn test_annotate_user_without_stored_image() {
        let conn = setup_db();
        UserRepository::upsert(&conn, "user-1", "Grace", None).unwrap();

        let annotated = annotate(&conn, vec![entry("user-1", "hi")]).unwrap();
        assert!(annotated[0].speaker.image.contains("initials"));
        assert!(annotated[0].speaker.image.contains("Grace"));
    }

    #[test]
    fn test_render_text() {
        let conn = setup_db();
        UserRepository::upsert(&conn, "user-1", "Ada", None).unwrap();

        let annotated = annotate(
            &conn,
            vec![entry("user-1", "hello"), entry("user-1", "bye")],
        )
        .unwrap();
        assert_eq!(render_text(&annotated), "Ada: hello\nAda: bye");
    }
}
