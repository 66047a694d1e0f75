use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::ai::OpenAiCompletions;
use crate::api::{ApiServer, AppState};
use crate::config::Config;
use crate::db::Database;
use crate::jobs::JobRunner;
use crate::platform::StreamClient;

/// Wire everything together and run the service until shutdown.
pub async fn run_service(db_path: Option<PathBuf>) -> Result<()> {
    info!("Starting huddle service");

    let config = Config::load()?;

    // CLI override wins over the config file, which wins over the data dir.
    let db = match db_path.or_else(|| config.database.path.clone()) {
        Some(path) => Database::open(&path)?,
        None => Database::open_default()?,
    };

    let platform = Arc::new(StreamClient::new(config.stream.clone()));
    let completions = Arc::new(OpenAiCompletions::new(config.openai.clone()));

    let (jobs, _runner) = JobRunner::spawn(db.clone(), completions.clone());

    let state = AppState::new(db, platform, completions, jobs, &config);
    let api_server = ApiServer::new(state, &config);

    info!("huddle is ready");
    api_server.start().await
}
