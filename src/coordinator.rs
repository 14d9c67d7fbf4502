use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use adk_rust::prelude::*;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use crate::agents::search::build_search_agent;
use crate::agents::tools::SubAgentTool;
use crate::config::RuntimeConfig;
use crate::pipeline::{Digest, normalize_reply};
use crate::provider::ResolvedModel;
use crate::runner::invoke_agent;
use crate::telemetry::TelemetrySink;
use crate::trail::ResponseTrail;
use crate::verticals::Vertical;

/// How often a coordinator is re-asked when its digest comes back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            delay_ms: 500,
        }
    }
}

/// Anything that turns a prompt into one raw coordinator reply.
#[async_trait]
pub trait ReplySource: Send + Sync {
    fn name(&self) -> &str;

    async fn reply(&self, prompt: &str, trail: &mut ResponseTrail) -> Result<String>;
}

/// A vertical's coordinator agent with its sub-agents attached as tools.
pub struct AdkCoordinator {
    name: String,
    agent: Arc<dyn Agent>,
    app_name: String,
    user_id: String,
    telemetry: TelemetrySink,
}

impl AdkCoordinator {
    pub fn build(
        vertical: Vertical,
        model: &ResolvedModel,
        cfg: &RuntimeConfig,
        telemetry: TelemetrySink,
    ) -> Result<Self> {
        Self::with_model(
            vertical,
            model.llm.clone(),
            model.search_enabled(),
            &cfg.app_name,
            &cfg.user_id,
            telemetry,
        )
    }

    pub fn with_model(
        vertical: Vertical,
        llm: Arc<dyn Llm>,
        search: bool,
        app_name: &str,
        user_id: &str,
        telemetry: TelemetrySink,
    ) -> Result<Self> {
        let mut builder = LlmAgentBuilder::new(vertical.coordinator_name())
            .description(vertical.description())
            .instruction(vertical.instruction())
            .model(llm.clone());

        for spec in vertical.sub_agents() {
            let sub_agent = build_search_agent(spec, llm.clone(), search)
                .with_context(|| format!("failed to build sub-agent '{}'", spec.name))?;
            let tool: Arc<dyn Tool> = Arc::new(SubAgentTool::new(
                *spec,
                sub_agent,
                app_name,
                user_id,
                telemetry.clone(),
            ));
            builder = builder.tool(tool);
        }

        let agent = builder
            .build()
            .with_context(|| format!("failed to build coordinator '{}'", vertical.coordinator_name()))?;

        tracing::debug!(
            coordinator = vertical.coordinator_name(),
            sub_agents = vertical.sub_agents().len(),
            search,
            "built coordinator"
        );

        Ok(Self {
            name: vertical.coordinator_name().to_string(),
            agent: Arc::new(agent),
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            telemetry,
        })
    }
}

#[async_trait]
impl ReplySource for AdkCoordinator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&self, prompt: &str, trail: &mut ResponseTrail) -> Result<String> {
        let reply = invoke_agent(
            self.agent.clone(),
            &self.name,
            &self.app_name,
            &self.user_id,
            prompt,
            &self.telemetry,
        )
        .await?;
        trail.record_model_call(&self.name, prompt, &reply);
        Ok(reply)
    }
}

/// Canned replies, served in order; the last one repeats. Used by the
/// `normalize` command and in tests.
pub struct StaticReply {
    name: String,
    replies: Vec<String>,
    cursor: AtomicUsize,
}

impl StaticReply {
    pub fn new(reply: impl Into<String>) -> Self {
        Self::sequence(vec![reply.into()])
    }

    pub fn sequence(replies: Vec<String>) -> Self {
        Self {
            name: "static_reply".to_string(),
            replies,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplySource for StaticReply {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&self, prompt: &str, trail: &mut ResponseTrail) -> Result<String> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .replies
            .get(index)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or_default();
        trail.record_model_call(&self.name, prompt, &reply);
        Ok(reply)
    }
}

/// Asks `source` for a reply and reconciles it into `vertical`'s digest.
///
/// While the primary section comes back empty the source is asked again, up
/// to `retry.max_attempts` calls in total. Errors from the source are not
/// retried.
pub async fn run_digest(
    source: &dyn ReplySource,
    vertical: Vertical,
    prompt: &str,
    retry: RetryPolicy,
    trail: &mut ResponseTrail,
    telemetry: &TelemetrySink,
) -> Result<Digest> {
    let schema = vertical.schema();
    let max_attempts = retry.max_attempts.max(1);
    telemetry.emit(
        "coordinator.started",
        json!({
            "vertical": vertical.label(),
            "source": source.name(),
            "prompt_chars": prompt.chars().count(),
        }),
    );
    tracing::info!(vertical = %vertical, source = source.name(), "coordinator started");

    let mut attempt = 0;
    loop {
        attempt += 1;
        let raw = match source.reply(prompt, trail).await {
            Ok(raw) => raw,
            Err(err) => {
                telemetry.emit(
                    "coordinator.failed",
                    json!({
                        "vertical": vertical.label(),
                        "attempt": attempt,
                        "error": format!("{err:#}"),
                    }),
                );
                return Err(err)
                    .with_context(|| format!("coordinator '{}' failed", vertical.coordinator_name()));
            }
        };

        let digest = normalize_reply(&raw, &schema, trail);
        let records = digest.records(&schema.primary_key).len();
        if !digest.is_empty() || attempt >= max_attempts {
            telemetry.emit_trail(vertical.label(), trail);
            telemetry.emit(
                "coordinator.completed",
                json!({
                    "vertical": vertical.label(),
                    "attempts": attempt,
                    "records": records,
                    "decode_failures": trail.decode_failures(),
                    "dropped_records": trail.dropped_records(),
                }),
            );
            tracing::info!(vertical = %vertical, attempts = attempt, records, "coordinator completed");
            return Ok(digest);
        }

        tracing::warn!(
            vertical = %vertical,
            attempt,
            max_attempts,
            "digest is empty; retrying"
        );
        tokio::time::sleep(Duration::from_millis(retry.delay_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trail::TrailEntry;

    const EMPTY: &str = "Sorry, I cannot comply.";
    const ONE_OUTAGE: &str = r#"[{"locations": "Indiranagar", "start_time": "10:00", "reason": "Maintenance"}]"#;

    fn no_delay(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay_ms: 0,
        }
    }

    #[tokio::test]
    async fn single_attempt_returns_whatever_came_back() {
        let source = StaticReply::new(EMPTY);
        let mut trail = ResponseTrail::new();
        let digest = run_digest(
            &source,
            Vertical::Energy,
            "prompt",
            RetryPolicy::default(),
            &mut trail,
            &TelemetrySink::disabled("test"),
        )
        .await
        .expect("empty digest is not an error");

        assert!(digest.is_empty());
        assert_eq!(source.calls(), 1);
        assert_eq!(trail.model_calls(), 1);
    }

    #[tokio::test]
    async fn empty_digest_is_retried_until_records_arrive() {
        let source = StaticReply::sequence(vec![EMPTY.to_string(), ONE_OUTAGE.to_string()]);
        let mut trail = ResponseTrail::new();
        let digest = run_digest(
            &source,
            Vertical::Energy,
            "prompt",
            no_delay(3),
            &mut trail,
            &TelemetrySink::disabled("test"),
        )
        .await
        .expect("second attempt should succeed");

        assert_eq!(digest.records("outage_summary").len(), 1);
        assert_eq!(source.calls(), 2);
        let attempts = trail
            .entries()
            .filter_map(|entry| match entry {
                TrailEntry::ModelCall { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(attempts, vec![1, 2]);
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let source = StaticReply::new(EMPTY);
        let mut trail = ResponseTrail::new();
        run_digest(
            &source,
            Vertical::Traffic,
            "prompt",
            no_delay(3),
            &mut trail,
            &TelemetrySink::disabled("test"),
        )
        .await
        .expect("exhausted retries still return a digest");

        assert_eq!(source.calls(), 3);
        assert_eq!(trail.decode_failures(), 3);
    }

    #[tokio::test]
    async fn digest_lines_without_records_are_not_retried() {
        let source = StaticReply::new(
            r#"{"cultural_events": [], "bengaluru_events_digest": ["Carnatic recital at Malleswaram"]}"#,
        );
        let mut trail = ResponseTrail::new();
        let digest = run_digest(
            &source,
            Vertical::Events,
            "prompt",
            no_delay(3),
            &mut trail,
            &TelemetrySink::disabled("test"),
        )
        .await
        .expect("digest lines are a usable answer");

        assert!(digest.records("cultural_events").is_empty());
        assert_eq!(digest.lines("bengaluru_events_digest").len(), 1);
        assert_eq!(source.calls(), 1);
    }

    struct FailingSource;

    #[async_trait]
    impl ReplySource for FailingSource {
        fn name(&self) -> &str {
            "failing"
        }

        async fn reply(&self, _prompt: &str, _trail: &mut ResponseTrail) -> Result<String> {
            anyhow::bail!("agent 'energy_coordinator' did not emit a final response")
        }
    }

    #[tokio::test]
    async fn source_errors_propagate_without_retry() {
        let mut trail = ResponseTrail::new();
        let err = run_digest(
            &FailingSource,
            Vertical::Energy,
            "prompt",
            no_delay(3),
            &mut trail,
            &TelemetrySink::disabled("test"),
        )
        .await
        .expect_err("upstream failure must surface");

        let rendered = format!("{err:#}");
        assert!(rendered.contains("coordinator 'energy_coordinator' failed"));
        assert!(rendered.contains("did not emit a final response"));
        assert!(trail.is_empty());
    }
}
