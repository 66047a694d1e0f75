//! Background transcript processing.
//!
//! The webhook handler must acknowledge quickly, so transcript work is
//! dispatched through an in-process queue and handled by a worker task.
//! Delivery is at-most-once; a failed job is logged and dropped.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::ai::{self, CompletionService};
use crate::db::meetings::MeetingRepository;
use crate::db::Database;
use crate::meeting::Transition;
use crate::transcript;

/// Name of the transcript-processing event, matching the webhook contract.
pub const PROCESSING_EVENT: &str = "meetings/processing";

#[derive(Debug, Clone)]
pub enum Job {
    ProcessTranscript {
        meeting_id: String,
        transcript_url: String,
    },
}

/// Fire-and-forget handle for enqueuing jobs from request handlers.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Wrap an existing channel, letting tests observe enqueued jobs.
    pub fn from_sender(tx: mpsc::Sender<Job>) -> Self {
        Self { tx }
    }

    pub fn enqueue(&self, job: Job) {
        if let Err(e) = self.tx.try_send(job) {
            warn!("Dropping background job, queue unavailable: {}", e);
        }
    }
}

pub struct JobRunner {
    db: Database,
    completions: Arc<dyn CompletionService>,
    http: reqwest::Client,
}

impl JobRunner {
    /// Spawn the worker task; returns the queue handle for producers.
    pub fn spawn(db: Database, completions: Arc<dyn CompletionService>) -> (JobQueue, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Job>(64);
        let runner = Self {
            db,
            completions,
            http: reqwest::Client::new(),
        };

        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if let Err(e) = runner.handle(job).await {
                    error!("Background job failed: {:#}", e);
                }
            }
        });

        (JobQueue { tx }, handle)
    }

    async fn handle(&self, job: Job) -> Result<()> {
        match job {
            Job::ProcessTranscript {
                meeting_id,
                transcript_url,
            } => {
                info!("{}: meeting {}", PROCESSING_EVENT, meeting_id);
                let raw = transcript::fetch(&self.http, &transcript_url).await?;
                process_raw_transcript(&self.db, self.completions.as_ref(), &meeting_id, &raw).await
            }
        }
    }
}

/// Parse, annotate, summarize, and complete the meeting. Split out from the
/// fetch so it can run against canned transcript bodies.
pub async fn process_raw_transcript(
    db: &Database,
    completions: &dyn CompletionService,
    meeting_id: &str,
    raw: &str,
) -> Result<()> {
    let entries = transcript::parse_jsonl(raw)?;

    let annotated = {
        let conn = db.lock().await;
        transcript::annotate(&conn, entries)?
    };

    let text = transcript::render_text(&annotated);
    let summary = ai::summarize_transcript(completions, &text)
        .await?
        .context("Summarizer returned no content")?;

    let outcome = {
        let conn = db.lock().await;
        MeetingRepository::complete_with_summary(&conn, meeting_id, &summary)?
    };

    match outcome {
        Transition::Applied => {
            info!(
                "Meeting {} completed with summary ({} chars)",
                meeting_id,
                summary.len()
            );
        }
        Transition::Rejected => {
            warn!(
                "Meeting {} was not in processing state, summary discarded",
                meeting_id
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChatTurn;
    use crate::db::agents::AgentRepository;
    use crate::db::users::UserRepository;
    use crate::meeting::MeetingStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedCompletions {
        reply: Option<String>,
        prompts: Mutex<Vec<Vec<ChatTurn>>>,
    }

    impl CannedCompletions {
        fn new(reply: Option<&str>) -> Self {
            Self {
                reply: reply.map(|s| s.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for CannedCompletions {
        async fn chat(&self, messages: &[ChatTurn]) -> Result<Option<String>> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    async fn processing_meeting(db: &Database) -> (String, String) {
        let conn = db.lock().await;
        let agent = AgentRepository::insert(&conn, "user-1", "Notetaker", "Notes.").unwrap();
        let meeting = MeetingRepository::insert(&conn, "user-1", &agent.id, "Standup").unwrap();
        MeetingRepository::mark_active(&conn, &meeting.id).unwrap();
        MeetingRepository::mark_processing(&conn, &meeting.id).unwrap();
        (meeting.id, agent.id)
    }

    #[tokio::test]
    async fn test_process_raw_transcript_completes_meeting() {
        let db = Database::in_memory().unwrap();
        let (meeting_id, agent_id) = processing_meeting(&db).await;
        {
            let conn = db.lock().await;
            UserRepository::upsert(&conn, "user-1", "Ada", None).unwrap();
        }

        let raw = format!(
            "{}\n{}\n",
            serde_json::json!({
                "speaker_id": "user-1", "type": "speech", "text": "hello",
                "start_ts": 0, "stop_ts": 800
            }),
            serde_json::json!({
                "speaker_id": agent_id, "type": "speech", "text": "hi",
                "start_ts": 900, "stop_ts": 1400
            }),
        );

        let completions = CannedCompletions::new(Some("A short summary."));
        process_raw_transcript(&db, &completions, &meeting_id, &raw)
            .await
            .unwrap();

        let conn = db.lock().await;
        let meeting = MeetingRepository::get_any(&conn, &meeting_id).unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Completed);
        assert_eq!(meeting.summary.as_deref(), Some("A short summary."));

        // The summarizer saw the annotated speaker names.
        let prompts = completions.prompts.lock().unwrap();
        assert!(prompts[0][1].content.contains("Ada: hello"));
        assert!(prompts[0][1].content.contains("Notetaker: hi"));
    }

    #[tokio::test]
    async fn test_process_raw_transcript_requires_summary() {
        let db = Database::in_memory().unwrap();
        let (meeting_id, _) = processing_meeting(&db).await;

        let raw = serde_json::json!({
            "speaker_id": "user-1", "type": "speech", "text": "hello",
            "start_ts": 0, "stop_ts": 800
        })
        .to_string();

        let completions = CannedCompletions::new(None);
        let err = process_raw_transcript(&db, &completions, &meeting_id, &raw)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no content"));

        // The meeting stays in processing for a later retry by hand.
        let conn = db.lock().await;
        let meeting = MeetingRepository::get_any(&conn, &meeting_id).unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Processing);
    }

    #[tokio::test]
    async fn test_queue_enqueue_and_run() {
        let db = Database::in_memory().unwrap();
        let completions: Arc<dyn CompletionService> =
            Arc::new(CannedCompletions::new(Some("summary")));
        let (queue, handle) = JobRunner::spawn(db, completions);

        // The worker drains jobs even when processing fails (bad URL here);
        // dropping the queue shuts it down.
        queue.enqueue(Job::ProcessTranscript {
            meeting_id: "missing".to_string(),
            transcript_url: "http://127.0.0.1:9/none".to_string(),
        });
        drop(queue);

        handle.await.unwrap();
    }
}
