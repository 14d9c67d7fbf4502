use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use adk_rust::prelude::*;
use adk_session::{CreateRequest, SessionService};
use anyhow::{Context, Result};

use crate::telemetry::unix_ms_now;

static SESSION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Every coordinator and sub-agent call runs on its own session, so ids only
/// need to be unique within the process.
pub fn fresh_session_id(prefix: &str) -> String {
    let seq = SESSION_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{}-{seq}", unix_ms_now(), std::process::id())
}

pub fn build_session_service() -> Arc<dyn SessionService> {
    Arc::new(InMemorySessionService::new())
}

pub async fn create_fresh_session(
    session_service: &Arc<dyn SessionService>,
    app_name: &str,
    user_id: &str,
) -> Result<String> {
    let session_id = fresh_session_id(user_id);
    session_service
        .create(CreateRequest {
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            session_id: Some(session_id.clone()),
            state: HashMap::new(),
        })
        .await
        .with_context(|| {
            format!("failed to create session '{session_id}' for app '{app_name}'")
        })?;
    Ok(session_id)
}
