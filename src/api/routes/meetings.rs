//! Meeting CRUD endpoints, plus cancellation and transcript retrieval.
//! All routes are scoped to the authenticated user.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::warn;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{require_user, AppState};
use crate::avatar::{generate_avatar_uri, AvatarVariant};
use crate::db::agents::AgentRepository;
use crate::db::meetings::{MeetingRepository, MeetingWithAgent};
use crate::db::pagination::{Page, PageParams};
use crate::meeting::status::MeetingStatus;
use crate::platform::PlatformUser;
use crate::transcript::{self, AnnotatedEntry};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_meetings).post(create_meeting))
        .route(
            "/:id",
            get(get_meeting).put(update_meeting).delete(delete_meeting),
        )
        .route("/:id/cancel", post(cancel_meeting))
        .route("/:id/transcript", get(get_transcript))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    page_size: Option<u32>,
    search: Option<String>,
    status: Option<String>,
    agent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeetingPayload {
    name: String,
    agent_id: String,
}

impl MeetingPayload {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::bad_request("Meeting name is required"));
        }
        if self.agent_id.trim().is_empty() {
            return Err(ApiError::bad_request("Agent id is required"));
        }
        Ok(())
    }
}

async fn list_meetings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<MeetingWithAgent>>> {
    let user_id = require_user(&headers)?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(
            MeetingStatus::parse(raw)
                .map_err(|_| ApiError::bad_request(format!("Unknown status: {raw}")))?,
        ),
        None => None,
    };
    let page = PageParams::clamped(query.page, query.page_size, &state.pagination);

    let conn = state.db.lock().await;
    let meetings = MeetingRepository::list(
        &conn,
        &user_id,
        query.search.as_deref(),
        status,
        query.agent_id.as_deref(),
        page,
    )?;
    Ok(Json(meetings))
}

/// Create a meeting and provision its call room up front, so the link is
/// joinable the moment the meeting exists.
async fn create_meeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<MeetingPayload>,
) -> ApiResult<Json<MeetingWithAgent>> {
    let user_id = require_user(&headers)?;
    payload.validate()?;

    let (meeting, agent) = {
        let conn = state.db.lock().await;
        let agent = AgentRepository::get(&conn, &payload.agent_id, &user_id)?
            .ok_or_else(|| ApiError::not_found("Agent not found"))?;
        let meeting = MeetingRepository::insert(&conn, &user_id, &agent.id, &payload.name)?;
        (meeting, agent)
    };

    state
        .platform
        .create_call(&meeting.id, &meeting.name, &user_id)
        .await?;
    state
        .platform
        .upsert_user(&PlatformUser {
            id: agent.id.clone(),
            name: agent.name.clone(),
            role: "user".to_string(),
            image: generate_avatar_uri(&agent.name, AvatarVariant::BotttsNeutral),
        })
        .await?;

    let conn = state.db.lock().await;
    let created = MeetingRepository::get_with_agent(&conn, &meeting.id, &user_id)?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
    Ok(Json(created))
}

async fn get_meeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<MeetingWithAgent>> {
    let user_id = require_user(&headers)?;

    let conn = state.db.lock().await;
    let meeting = MeetingRepository::get_with_agent(&conn, &id, &user_id)?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
    Ok(Json(meeting))
}

async fn update_meeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<MeetingPayload>,
) -> ApiResult<Json<MeetingWithAgent>> {
    let user_id = require_user(&headers)?;
    payload.validate()?;

    let conn = state.db.lock().await;
    AgentRepository::get(&conn, &payload.agent_id, &user_id)?
        .ok_or_else(|| ApiError::not_found("Agent not found"))?;
    MeetingRepository::update(&conn, &id, &user_id, &payload.name, &payload.agent_id)?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    let meeting = MeetingRepository::get_with_agent(&conn, &id, &user_id)?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
    Ok(Json(meeting))
}

async fn delete_meeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<MeetingWithAgent>> {
    let user_id = require_user(&headers)?;

    let conn = state.db.lock().await;
    let meeting = MeetingRepository::get_with_agent(&conn, &id, &user_id)?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
    MeetingRepository::delete(&conn, &id, &user_id)?;
    Ok(Json(meeting))
}

/// Cancel an upcoming meeting. Meetings that already started cannot be
/// cancelled, only completed through the call lifecycle.
async fn cancel_meeting(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<MeetingWithAgent>> {
    let user_id = require_user(&headers)?;

    let conn = state.db.lock().await;
    MeetingRepository::get_with_agent(&conn, &id, &user_id)?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;

    if !MeetingRepository::cancel(&conn, &id, &user_id)?.applied() {
        return Err(ApiError::bad_request(
            "Only upcoming meetings can be cancelled",
        ));
    }

    let meeting = MeetingRepository::get_with_agent(&conn, &id, &user_id)?
        .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
    Ok(Json(meeting))
}

/// The annotated transcript for a completed meeting. Missing or
/// unavailable transcripts yield an empty list rather than an error, so
/// clients can poll while processing finishes.
async fn get_transcript(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<AnnotatedEntry>>> {
    let user_id = require_user(&headers)?;

    let transcript_url = {
        let conn = state.db.lock().await;
        let meeting = MeetingRepository::get_with_agent(&conn, &id, &user_id)?
            .ok_or_else(|| ApiError::not_found("Meeting not found"))?;
        meeting.meeting.transcript_url
    };

    let Some(url) = transcript_url else {
        return Ok(Json(Vec::new()));
    };

    let raw = match transcript::fetch(&state.http, &url).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Failed to fetch transcript for meeting {}: {:#}", id, e);
            return Ok(Json(Vec::new()));
        }
    };
    let entries = match transcript::parse_jsonl(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to parse transcript for meeting {}: {:#}", id, e);
            return Ok(Json(Vec::new()));
        }
    };

    let conn = state.db.lock().await;
    let annotated = transcript::annotate(&conn, entries)?;
    Ok(Json(annotated))
}
