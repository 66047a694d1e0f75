//! Webhook event dispatch and meeting lifecycle.
//!
//! Reacts to signed call/chat platform events and drives a meeting through
//! its status lifecycle: `Upcoming → Active` on session start,
//! `Active → Processing` on session end, with the transcript post-processor
//! finishing `Processing → Completed`. Guarded transitions compare-and-set
//! on the stored status, so stale or duplicate events degrade to no-ops.

pub mod events;
pub mod signature;

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ai::{self, CompletionService, HISTORY_WINDOW};
use crate::avatar::{generate_avatar_uri, AvatarVariant};
use crate::db::agents::AgentRepository;
use crate::db::meetings::MeetingRepository;
use crate::db::Database;
use crate::jobs::{Job, JobQueue};
use crate::meeting::{MeetingStatus, Transition};
use crate::platform::{CallPlatform, PlatformUser};

use events::*;

/// Failure classes the webhook endpoint maps to HTTP statuses. Not-found
/// and precondition-mismatch are deliberately conflated.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

type LifecycleResult = Result<(), LifecycleError>;

fn bad_request(msg: &str) -> LifecycleError {
    LifecycleError::BadRequest(msg.to_string())
}

fn not_found(msg: &str) -> LifecycleError {
    LifecycleError::NotFound(msg.to_string())
}

/// Event-dispatching lifecycle handler. All collaborators are injected.
pub struct LifecycleHandler {
    db: Database,
    platform: Arc<dyn CallPlatform>,
    completions: Arc<dyn CompletionService>,
    jobs: JobQueue,
}

impl LifecycleHandler {
    pub fn new(
        db: Database,
        platform: Arc<dyn CallPlatform>,
        completions: Arc<dyn CompletionService>,
        jobs: JobQueue,
    ) -> Self {
        Self {
            db,
            platform,
            completions,
            jobs,
        }
    }

    /// Dispatch a verified webhook payload by its `type` discriminator.
    /// Unknown (or absent) event types are acknowledged as no-ops.
    pub async fn dispatch(&self, payload: &Value) -> LifecycleResult {
        let Some(event_type) = payload.get("type").and_then(|v| v.as_str()) else {
            debug!("Webhook payload without event type, ignoring");
            return Ok(());
        };

        match event_type {
            CALL_SESSION_STARTED => self.session_started(parse(payload)?).await,
            CALL_SESSION_PARTICIPANT_LEFT => self.participant_left(parse(payload)?).await,
            CALL_SESSION_ENDED => self.session_ended(parse(payload)?).await,
            CALL_TRANSCRIPTION_READY => self.transcription_ready(parse(payload)?).await,
            CALL_RECORDING_READY => self.recording_ready(parse(payload)?).await,
            MESSAGE_NEW => self.message_new(parse(payload)?).await,
            other => {
                debug!("Ignoring unhandled webhook event type: {}", other);
                Ok(())
            }
        }
    }

    /// `Upcoming → Active`, then attach the realtime AI participant with
    /// the agent's instructions.
    async fn session_started(&self, event: SessionEvent) -> LifecycleResult {
        let meeting_id = event
            .meeting_id()
            .ok_or_else(|| bad_request("Missing meetingId"))?
            .to_string();

        let (meeting, agent) = {
            let conn = self.db.lock().await;
            let meeting = MeetingRepository::get_by_id_and_status(
                &conn,
                &meeting_id,
                MeetingStatus::Upcoming,
            )?
            .ok_or_else(|| not_found("Meeting not found"))?;

            let agent = AgentRepository::get_any(&conn, &meeting.agent_id)?
                .ok_or_else(|| not_found("Agent not found"))?;

            if MeetingRepository::mark_active(&conn, &meeting.id)? == Transition::Rejected {
                // A concurrent event won the transition; nothing left to do.
                warn!("Meeting {} already left upcoming, skipping", meeting.id);
                return Ok(());
            }

            (meeting, agent)
        };

        info!("Meeting {} is active, connecting agent {}", meeting.id, agent.id);

        self.platform
            .connect_agent(&meeting.id, &agent.id, &agent.instructions)
            .await?;

        Ok(())
    }

    /// Failsafe end-call, no status precondition: the downstream call is
    /// idempotent and a stray event must never leave a room open.
    async fn participant_left(&self, event: ParticipantLeftEvent) -> LifecycleResult {
        let meeting_id = event
            .call_cid
            .as_deref()
            .and_then(meeting_id_from_cid)
            .ok_or_else(|| bad_request("Missing meetingId"))?
            .to_string();

        debug!("Participant left meeting {}, ending call", meeting_id);
        self.platform.end_call(&meeting_id).await?;

        Ok(())
    }

    /// Guarded `Active → Processing`; any other stored status is a no-op.
    async fn session_ended(&self, event: SessionEvent) -> LifecycleResult {
        let meeting_id = event
            .meeting_id()
            .ok_or_else(|| bad_request("Missing meetingId"))?
            .to_string();

        let outcome = {
            let conn = self.db.lock().await;
            MeetingRepository::mark_processing(&conn, &meeting_id)?
        };

        match outcome {
            Transition::Applied => info!("Meeting {} is processing", meeting_id),
            Transition::Rejected => {
                debug!("Session ended for non-active meeting {}, ignoring", meeting_id)
            }
        }

        Ok(())
    }

    /// Store the transcript URL and hand off to the background processor.
    async fn transcription_ready(&self, event: TranscriptionReadyEvent) -> LifecycleResult {
        let meeting_id = event
            .call_cid
            .as_deref()
            .and_then(meeting_id_from_cid)
            .ok_or_else(|| bad_request("Missing meetingId"))?
            .to_string();
        let url = event
            .call_transcription
            .map(|t| t.url)
            .ok_or_else(|| bad_request("Missing transcript URL"))?;

        let matched = {
            let conn = self.db.lock().await;
            MeetingRepository::set_transcript_url(&conn, &meeting_id, &url)?
        };
        if !matched {
            return Err(not_found("Meeting not found"));
        }

        info!("Transcript ready for meeting {}, enqueueing processing", meeting_id);
        self.jobs.enqueue(Job::ProcessTranscript {
            meeting_id,
            transcript_url: url,
        });

        Ok(())
    }

    /// Store the recording URL; a missing row is tolerated.
    async fn recording_ready(&self, event: RecordingReadyEvent) -> LifecycleResult {
        let meeting_id = event
            .call_cid
            .as_deref()
            .and_then(meeting_id_from_cid)
            .ok_or_else(|| bad_request("Missing meetingId"))?
            .to_string();
        let url = event
            .call_recording
            .map(|r| r.url)
            .ok_or_else(|| bad_request("Missing recording URL"))?;

        let matched = {
            let conn = self.db.lock().await;
            MeetingRepository::set_recording_url(&conn, &meeting_id, &url)?
        };
        if !matched {
            warn!("Recording ready for unknown meeting {}", meeting_id);
        }

        Ok(())
    }

    /// Chat followup on a completed meeting. The agent never replies to its
    /// own messages.
    async fn message_new(&self, event: MessageNewEvent) -> LifecycleResult {
        let user_id = event.user.and_then(|u| u.id);
        let channel_id = event.channel_id;
        let text = event.message.and_then(|m| m.text);

        let (Some(user_id), Some(channel_id), Some(text)) = (user_id, channel_id, text) else {
            return Err(bad_request("Missing userId, channelId or text"));
        };

        let (meeting, agent) = {
            let conn = self.db.lock().await;
            let meeting = MeetingRepository::get_by_id_and_status(
                &conn,
                &channel_id,
                MeetingStatus::Completed,
            )?
            .ok_or_else(|| not_found("Meeting not found"))?;

            let agent = AgentRepository::get_any(&conn, &meeting.agent_id)?
                .ok_or_else(|| not_found("Agent not found"))?;

            (meeting, agent)
        };

        if user_id == agent.id {
            debug!("Skipping agent's own message in channel {}", channel_id);
            return Ok(());
        }

        let summary = meeting
            .summary
            .as_deref()
            .context("Completed meeting has no summary")?;

        let recent = self
            .platform
            .channel_messages(&channel_id, HISTORY_WINDOW)
            .await?;
        let history = ai::history_window(&recent, &agent.id, HISTORY_WINDOW);

        let reply = ai::generate_followup(
            self.completions.as_ref(),
            summary,
            &agent.instructions,
            history,
            &text,
        )
        .await?
        .ok_or_else(|| bad_request("No response from AI"))?;

        self.platform
            .upsert_user(&PlatformUser {
                id: agent.id.clone(),
                name: agent.name.clone(),
                role: "user".to_string(),
                image: generate_avatar_uri(&agent.name, AvatarVariant::BotttsNeutral),
            })
            .await?;

        info!(
            "Relaying followup reply from agent {} into channel {}",
            agent.id, channel_id
        );
        self.platform
            .send_agent_message(&channel_id, &agent.id, &reply)
            .await?;

        Ok(())
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: &Value) -> Result<T, LifecycleError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| LifecycleError::BadRequest(format!("Malformed event payload: {}", e)))
}
