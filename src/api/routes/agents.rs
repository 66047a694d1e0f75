//! Agent CRUD endpoints. All routes are scoped to the authenticated user.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{require_user, AppState};
use crate::db::agents::{AgentRecord, AgentRepository};
use crate::db::pagination::{Page, PageParams};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_agents).post(create_agent))
        .route(
            "/:id",
            get(get_agent).put(update_agent).delete(delete_agent),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u32>,
    page_size: Option<u32>,
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentPayload {
    name: String,
    instructions: String,
}

impl AgentPayload {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::bad_request("Agent name is required"));
        }
        if self.instructions.trim().is_empty() {
            return Err(ApiError::bad_request("Agent instructions are required"));
        }
        Ok(())
    }
}

async fn list_agents(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<AgentRecord>>> {
    let user_id = require_user(&headers)?;
    let page = PageParams::clamped(query.page, query.page_size, &state.pagination);

    let conn = state.db.lock().await;
    let agents = AgentRepository::list(&conn, &user_id, query.search.as_deref(), page)?;
    Ok(Json(agents))
}

async fn create_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AgentPayload>,
) -> ApiResult<Json<AgentRecord>> {
    let user_id = require_user(&headers)?;
    payload.validate()?;

    let conn = state.db.lock().await;
    let agent = AgentRepository::insert(&conn, &user_id, &payload.name, &payload.instructions)?;
    Ok(Json(agent))
}

async fn get_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentRecord>> {
    let user_id = require_user(&headers)?;

    let conn = state.db.lock().await;
    let agent = AgentRepository::get(&conn, &id, &user_id)?
        .ok_or_else(|| ApiError::not_found("Agent not found"))?;
    Ok(Json(agent))
}

async fn update_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<AgentPayload>,
) -> ApiResult<Json<AgentRecord>> {
    let user_id = require_user(&headers)?;
    payload.validate()?;

    let conn = state.db.lock().await;
    let agent = AgentRepository::update(&conn, &id, &user_id, &payload.name, &payload.instructions)?
        .ok_or_else(|| ApiError::not_found("Agent not found"))?;
    Ok(Json(agent))
}

async fn delete_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<AgentRecord>> {
    let user_id = require_user(&headers)?;

    let conn = state.db.lock().await;
    let agent = AgentRepository::delete(&conn, &id, &user_id)?
        .ok_or_else(|| ApiError::not_found("Agent not found"))?;
    Ok(Json(agent))
}
