//! Inbound webhook event payloads.
//!
//! Events carry the meeting id either embedded in the call's custom data or
//! inside the composite call-channel identifier (`"<type>:<meetingId>"`).

use serde::Deserialize;

pub const CALL_SESSION_STARTED: &str = "call.session_started";
pub const CALL_SESSION_PARTICIPANT_LEFT: &str = "call.session_participant_left";
pub const CALL_SESSION_ENDED: &str = "call.session_ended";
pub const CALL_TRANSCRIPTION_READY: &str = "call.transcription_ready";
pub const CALL_RECORDING_READY: &str = "call.recording_ready";
pub const MESSAGE_NEW: &str = "message.new";

/// `call.session_started` / `call.session_ended`.
#[derive(Debug, Deserialize)]
pub struct SessionEvent {
    pub call: Option<CallInfo>,
}

impl SessionEvent {
    pub fn meeting_id(&self) -> Option<&str> {
        self.call
            .as_ref()?
            .custom
            .as_ref()?
            .meeting_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct CallInfo {
    pub custom: Option<CallCustom>,
}

#[derive(Debug, Deserialize)]
pub struct CallCustom {
    #[serde(rename = "meetingId")]
    pub meeting_id: Option<String>,
}

/// `call.session_participant_left`.
#[derive(Debug, Deserialize)]
pub struct ParticipantLeftEvent {
    pub call_cid: Option<String>,
}

/// `call.transcription_ready`.
#[derive(Debug, Deserialize)]
pub struct TranscriptionReadyEvent {
    pub call_cid: Option<String>,
    pub call_transcription: Option<MediaRef>,
}

/// `call.recording_ready`.
#[derive(Debug, Deserialize)]
pub struct RecordingReadyEvent {
    pub call_cid: Option<String>,
    pub call_recording: Option<MediaRef>,
}

#[derive(Debug, Deserialize)]
pub struct MediaRef {
    pub url: String,
}

/// `message.new` from the chat side; the channel id doubles as the
/// meeting id.
#[derive(Debug, Deserialize)]
pub struct MessageNewEvent {
    pub user: Option<EventUser>,
    pub channel_id: Option<String>,
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
pub struct EventUser {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    pub text: Option<String>,
}

/// Extract the meeting id from a composite call-channel identifier.
pub fn meeting_id_from_cid(cid: &str) -> Option<&str> {
    let (_, meeting_id) = cid.split_once(':')?;
    if meeting_id.is_empty() {
        None
    } else {
        Some(meeting_id)
    }
}
