use std::collections::HashMap;
use std::sync::Arc;

use adk_rust::futures::StreamExt;
use adk_rust::prelude::*;
use adk_session::SessionService;
use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::session::{build_session_service, create_fresh_session};
use crate::telemetry::TelemetrySink;

pub fn build_runner(
    agent: Arc<dyn Agent>,
    app_name: &str,
    session_service: Arc<dyn SessionService>,
) -> Result<Runner> {
    Runner::new(RunnerConfig {
        app_name: app_name.to_string(),
        agent,
        session_service,
        artifact_service: Some(Arc::new(InMemoryArtifactService::new())),
        memory_service: None,
        plugin_manager: None,
        run_config: None,
        compaction_config: None,
    })
    .context("failed to build ADK runner")
}

/// Tracks streamed text per author and remembers the last final response.
#[derive(Default, Debug)]
pub struct FinalReplyTracker {
    latest_final_text: Option<String>,
    last_textful_author: Option<String>,
    by_author: HashMap<String, String>,
}

impl FinalReplyTracker {
    pub fn ingest(&mut self, author: &str, text: &str, partial: bool, is_final: bool) {
        if text.is_empty() {
            return;
        }

        self.last_textful_author = Some(author.to_string());
        let buffer = self.by_author.entry(author.to_string()).or_default();
        merge_author_text(buffer, text, partial);

        if is_final && !text.trim().is_empty() {
            self.latest_final_text = Some(text.to_string());
        }
    }

    /// The final response text, or else everything the last speaking author
    /// streamed. `None` when nothing textual arrived.
    pub fn resolve(&self) -> Option<String> {
        if let Some(final_text) = &self.latest_final_text {
            return Some(final_text.clone());
        }

        let author = self.last_textful_author.as_ref()?;
        let text = self.by_author.get(author)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(trimmed.to_string())
    }
}

// Partial chunks append; full snapshots replace what was accumulated.
fn merge_author_text(buffer: &mut String, text: &str, partial: bool) {
    if partial || buffer.is_empty() {
        buffer.push_str(text);
        return;
    }
    if text.starts_with(buffer.as_str()) || !buffer.ends_with(text) {
        *buffer = text.to_string();
    }
}

pub fn event_text(event: &Event) -> String {
    match event.content() {
        Some(content) => content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        None => String::new(),
    }
}

pub fn extract_tool_failure_message(response: &Value) -> Option<String> {
    if let Some(message) = response.get("error").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    if let Some(message) = response.get("message").and_then(Value::as_str) {
        let status = response
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if status.eq_ignore_ascii_case("error") || status.eq_ignore_ascii_case("failed") {
            return Some(message.to_string());
        }
    }
    None
}

/// Logs sub-agent calls made by a coordinator and mirrors them to telemetry.
pub fn emit_tool_lifecycle_events(event: &Event, telemetry: &TelemetrySink) {
    let Some(content) = event.content() else {
        return;
    };

    for part in &content.parts {
        match part {
            Part::FunctionCall { name, .. } => {
                tracing::info!(tool = %name, author = %event.author, "sub-agent requested");
                telemetry.emit(
                    "tool.requested",
                    json!({ "tool": name, "author": event.author }),
                );
            }
            Part::FunctionResponse {
                function_response, ..
            } => {
                if let Some(error_message) =
                    extract_tool_failure_message(&function_response.response)
                {
                    tracing::warn!(
                        tool = %function_response.name,
                        author = %event.author,
                        error = %error_message,
                        "sub-agent failed"
                    );
                    telemetry.emit(
                        "tool.failed",
                        json!({
                            "tool": function_response.name,
                            "author": event.author,
                            "error": error_message
                        }),
                    );
                } else {
                    tracing::info!(
                        tool = %function_response.name,
                        author = %event.author,
                        "sub-agent completed"
                    );
                    telemetry.emit(
                        "tool.succeeded",
                        json!({ "tool": function_response.name, "author": event.author }),
                    );
                }
            }
            _ => {}
        }
    }
}

/// Streams one prompt through `runner` and returns the final text reply.
///
/// A stream error or a run that never produces text is an upstream failure.
pub async fn run_to_final_reply(
    runner: &Runner,
    agent_name: &str,
    user_id: &str,
    session_id: &str,
    prompt: &str,
    telemetry: &TelemetrySink,
) -> Result<String> {
    let mut stream = runner
        .run(
            user_id.to_string(),
            session_id.to_string(),
            Content::new("user").with_text(prompt),
        )
        .await
        .with_context(|| format!("failed to start runner stream for '{agent_name}'"))?;

    let mut tracker = FinalReplyTracker::default();

    while let Some(event_result) = stream.next().await {
        let event =
            event_result.with_context(|| format!("runner stream failed for '{agent_name}'"))?;
        let text = event_text(&event);

        tracing::debug!(
            author = %event.author,
            is_final = event.is_final_response(),
            partial = event.llm_response.partial,
            text_len = text.len(),
            "received runner event"
        );

        if event.author == "user" {
            continue;
        }

        emit_tool_lifecycle_events(&event, telemetry);
        tracker.ingest(
            &event.author,
            &text,
            event.llm_response.partial,
            event.is_final_response(),
        );
    }

    tracker
        .resolve()
        .ok_or_else(|| anyhow::anyhow!("agent '{agent_name}' did not emit a final response"))
}

/// Runs `agent` once on a fresh in-memory session of its own.
pub async fn invoke_agent(
    agent: Arc<dyn Agent>,
    agent_name: &str,
    app_name: &str,
    user_id: &str,
    prompt: &str,
    telemetry: &TelemetrySink,
) -> Result<String> {
    let session_service = build_session_service();
    let session_id = create_fresh_session(&session_service, app_name, user_id).await?;
    let runner = build_runner(agent, app_name, session_service)?;
    run_to_final_reply(&runner, agent_name, user_id, &session_id, prompt, telemetry).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_prefers_the_final_snapshot() {
        let mut tracker = FinalReplyTracker::default();
        tracker.ingest("coordinator", "```json\n[", true, false);
        tracker.ingest("coordinator", "]\n```", true, false);
        tracker.ingest("coordinator", "```json\n[]\n```", false, true);
        assert_eq!(tracker.resolve().as_deref(), Some("```json\n[]\n```"));
    }

    #[test]
    fn tracker_falls_back_to_last_textful_author() {
        let mut tracker = FinalReplyTracker::default();
        tracker.ingest("bescom_agent", "raw notices", false, false);
        tracker.ingest("energy_coordinator", "partial ", true, false);
        tracker.ingest("energy_coordinator", "digest", true, false);
        assert_eq!(tracker.resolve().as_deref(), Some("partial digest"));
    }

    #[test]
    fn tracker_without_text_resolves_to_none() {
        let mut tracker = FinalReplyTracker::default();
        tracker.ingest("energy_coordinator", "", false, true);
        tracker.ingest("energy_coordinator", "   ", true, false);
        assert!(tracker.resolve().is_none());
    }

    #[test]
    fn tool_failure_message_reads_error_or_failed_status() {
        assert_eq!(
            extract_tool_failure_message(&json!({"error": "quota"})).as_deref(),
            Some("quota")
        );
        assert_eq!(
            extract_tool_failure_message(&json!({"status": "failed", "message": "timeout"}))
                .as_deref(),
            Some("timeout")
        );
        assert!(extract_tool_failure_message(&json!({"result": "ok"})).is_none());
    }
}
