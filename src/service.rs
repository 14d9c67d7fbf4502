//! One request end to end: area request → prompt → coordinator → digest →
//! publish. Shared by the CLI commands and the push endpoint.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;

use crate::config::RuntimeConfig;
use crate::coordinator::{AdkCoordinator, ReplySource, run_digest};
use crate::inbound::{AreaRequest, PushEnvelope};
use crate::pipeline::Digest;
use crate::provider::resolve_model;
use crate::publish::{Publisher, build_publisher, publish_digest};
use crate::telemetry::TelemetrySink;
use crate::trail::ResponseTrail;
use crate::verticals::Vertical;

/// Builds the reply source for a vertical.
pub type SourceFactory =
    Arc<dyn Fn(Vertical, &TelemetrySink) -> Result<Arc<dyn ReplySource>> + Send + Sync>;

/// What a handled request produced.
#[derive(Debug, Clone, Serialize)]
pub struct DigestRun {
    pub vertical: Vertical,
    pub digest: Digest,
    pub message_id: Option<String>,
    pub trail: ResponseTrail,
}

#[derive(Clone)]
pub struct DigestService {
    pub cfg: RuntimeConfig,
    sources: SourceFactory,
    publisher: Arc<dyn Publisher>,
    pub telemetry: TelemetrySink,
}

impl DigestService {
    pub fn new(
        cfg: RuntimeConfig,
        sources: SourceFactory,
        publisher: Arc<dyn Publisher>,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            cfg,
            sources,
            publisher,
            telemetry,
        }
    }

    /// Resolves the model once; every vertical's coordinator shares it.
    pub fn from_config(cfg: RuntimeConfig, telemetry: TelemetrySink) -> Result<Self> {
        let model = Arc::new(resolve_model(&cfg)?);
        telemetry.emit(
            "model.resolved",
            json!({
                "provider": model.provider_label(),
                "model": model.model_name,
                "search": model.search_enabled(),
            }),
        );

        let factory_cfg = cfg.clone();
        let sources: SourceFactory = Arc::new(move |vertical: Vertical, telemetry: &TelemetrySink| {
            let coordinator =
                AdkCoordinator::build(vertical, model.as_ref(), &factory_cfg, telemetry.clone())?;
            Ok(Arc::new(coordinator) as Arc<dyn ReplySource>)
        });
        let publisher = build_publisher(&cfg);
        Ok(Self::new(cfg, sources, publisher, telemetry))
    }

    pub async fn run_prompt(
        &self,
        vertical: Vertical,
        prompt: &str,
        trail: &mut ResponseTrail,
    ) -> Result<Digest> {
        let source = (self.sources)(vertical, &self.telemetry)?;
        run_digest(
            source.as_ref(),
            vertical,
            prompt,
            self.cfg.retry,
            trail,
            &self.telemetry,
        )
        .await
    }

    pub async fn run_request(
        &self,
        vertical: Vertical,
        request: &AreaRequest,
        publish: bool,
    ) -> Result<DigestRun> {
        let prompt = vertical.build_prompt(request)?;
        self.run_and_publish(vertical, &prompt, publish).await
    }

    pub async fn run_and_publish(
        &self,
        vertical: Vertical,
        prompt: &str,
        publish: bool,
    ) -> Result<DigestRun> {
        tracing::info!(vertical = %vertical, prompt = %prompt, "running coordinator");
        let mut trail = ResponseTrail::new();
        let digest = self.run_prompt(vertical, prompt, &mut trail).await?;
        let message_id = if publish {
            self.publish(vertical, &digest, &mut trail)
        } else {
            None
        };
        Ok(DigestRun {
            vertical,
            digest,
            message_id,
            trail,
        })
    }

    pub fn publish(
        &self,
        vertical: Vertical,
        digest: &Digest,
        trail: &mut ResponseTrail,
    ) -> Option<String> {
        publish_digest(
            self.publisher.as_ref(),
            &self.cfg.topic_for(vertical),
            vertical,
            digest,
            trail,
            &self.telemetry,
        )
    }

    /// Handles one push delivery: always publishes the digest it produced.
    pub async fn handle_envelope(&self, vertical: Vertical, body: &str) -> Result<DigestRun> {
        let envelope = PushEnvelope::parse(body)?;
        let request = envelope.area_request()?;
        tracing::info!(
            vertical = %vertical,
            message_id = envelope.message.message_id.as_deref().unwrap_or("-"),
            "received push envelope"
        );
        self.run_request(vertical, &request, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::StaticReply;
    use crate::publish::JsonlPublisher;
    use crate::tests::base_cfg;

    fn service_with(reply: &'static str, publish_path: &std::path::Path) -> DigestService {
        let sources: SourceFactory = Arc::new(move |_vertical: Vertical, _telemetry: &TelemetrySink| {
            Ok(Arc::new(StaticReply::new(reply)) as Arc<dyn ReplySource>)
        });
        DigestService::new(
            base_cfg(),
            sources,
            Arc::new(JsonlPublisher::new(publish_path)),
            TelemetrySink::disabled("test"),
        )
    }

    #[tokio::test]
    async fn envelope_is_decoded_run_and_published() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("published.jsonl");
        let service = service_with(
            r#"{"outage_summary": [{"location": "BTM Layout", "start_time": "10:00", "reason": "Tree trimming"}]}"#,
            &path,
        );
        let request = AreaRequest {
            areas: vec!["BTM Layout".to_string()],
            ..AreaRequest::default()
        };
        let body = serde_json::to_string(
            &PushEnvelope::wrap(&request, Some("m-7".to_string())).expect("wrap should succeed"),
        )
        .expect("envelope serializes");

        let run = service
            .handle_envelope(Vertical::Energy, &body)
            .await
            .expect("push should be handled");

        assert_eq!(run.digest.records("outage_summary").len(), 1);
        assert!(run.message_id.is_some());
        let published = std::fs::read_to_string(&path).expect("publish file should exist");
        assert!(published.contains("\"topic\":\"energy-digest\""));
        assert!(published.contains("BTM Layout"));
    }

    #[tokio::test]
    async fn bad_envelope_is_an_input_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let service = service_with("[]", &dir.path().join("published.jsonl"));

        let err = service
            .handle_envelope(Vertical::Traffic, "{\"message\": {\"data\": \"@@@\"}}")
            .await
            .expect_err("bad base64 must fail");
        assert!(format!("{err:#}").contains("envelope"));
    }

    #[tokio::test]
    async fn pothole_request_without_image_or_coordinates_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let service = service_with("[]", &dir.path().join("published.jsonl"));

        let err = service
            .run_request(Vertical::Pothole, &AreaRequest::default(), true)
            .await
            .expect_err("pothole needs an image or coordinates");
        assert!(err.to_string().contains("area request"));
        assert!(!dir.path().join("published.jsonl").exists());
    }
}
