use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;

use crate::cli::PublishBackend;
use crate::config::RuntimeConfig;
use crate::pipeline::Digest;
use crate::telemetry::{TelemetrySink, unix_ms_now};
use crate::trail::{ResponseTrail, TrailEntry};
use crate::verticals::Vertical;

static MESSAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// `<unix_ms>-<seq>`, unique within the process.
pub fn next_message_id() -> String {
    let seq = MESSAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}", unix_ms_now(), seq)
}

/// One published message as it is written out.
#[derive(Debug, Clone, Serialize)]
pub struct PublishedMessage<'a> {
    pub topic: &'a str,
    pub message_id: &'a str,
    pub published_at: String,
    pub data: &'a str,
}

pub trait Publisher: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Publishes `data` on `topic` and returns the message id.
    fn publish(&self, topic: &str, data: &str) -> Result<String>;
}

fn message_line(topic: &str, message_id: &str, data: &str) -> Result<String> {
    serde_json::to_string(&PublishedMessage {
        topic,
        message_id,
        published_at: chrono::Utc::now().to_rfc3339(),
        data,
    })
    .context("failed to serialize publish message")
}

pub struct StdoutPublisher;

impl Publisher for StdoutPublisher {
    fn backend(&self) -> &'static str {
        "stdout"
    }

    fn publish(&self, topic: &str, data: &str) -> Result<String> {
        let message_id = next_message_id();
        let line = message_line(topic, &message_id, data)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").context("failed to publish to stdout")?;
        Ok(message_id)
    }
}

/// Appends one JSON object per message to a local file.
pub struct JsonlPublisher {
    path: PathBuf,
    file_lock: Arc<Mutex<()>>,
}

impl JsonlPublisher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_lock: Arc::new(Mutex::new(())),
        }
    }
}

impl Publisher for JsonlPublisher {
    fn backend(&self) -> &'static str {
        "jsonl"
    }

    fn publish(&self, topic: &str, data: &str) -> Result<String> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create publish directory '{}'", parent.display())
            })?;
        }

        let message_id = next_message_id();
        let line = message_line(topic, &message_id, data)?;

        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open publish path '{}'", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to publish to '{}'", self.path.display()))?;
        Ok(message_id)
    }
}

pub struct DisabledPublisher;

impl Publisher for DisabledPublisher {
    fn backend(&self) -> &'static str {
        "disabled"
    }

    fn publish(&self, topic: &str, _data: &str) -> Result<String> {
        anyhow::bail!("publish backend is disabled; nothing sent to topic '{topic}'")
    }
}

pub fn build_publisher(cfg: &RuntimeConfig) -> Arc<dyn Publisher> {
    match cfg.publish_backend {
        PublishBackend::Stdout => Arc::new(StdoutPublisher),
        PublishBackend::Jsonl => Arc::new(JsonlPublisher::new(&cfg.publish_path)),
        PublishBackend::Disabled => Arc::new(DisabledPublisher),
    }
}

/// Publishes `digest` as pretty JSON. A failure is logged, recorded in the
/// trail and reported to telemetry, but never returned: the digest was
/// produced either way.
pub fn publish_digest(
    publisher: &dyn Publisher,
    topic: &str,
    vertical: Vertical,
    digest: &Digest,
    trail: &mut ResponseTrail,
    telemetry: &TelemetrySink,
) -> Option<String> {
    let result = serde_json::to_string_pretty(digest)
        .context("failed to serialize digest")
        .and_then(|data| publisher.publish(topic, &data));

    match result {
        Ok(message_id) => {
            tracing::info!(
                vertical = %vertical,
                topic,
                message_id = %message_id,
                backend = publisher.backend(),
                "digest published"
            );
            telemetry.emit(
                "digest.published",
                json!({
                    "vertical": vertical.label(),
                    "topic": topic,
                    "message_id": message_id,
                    "backend": publisher.backend(),
                }),
            );
            Some(message_id)
        }
        Err(err) => {
            let error = format!("{err:#}");
            tracing::warn!(vertical = %vertical, topic, error = %error, "publish failed");
            telemetry.emit(
                "publish.failed",
                json!({ "vertical": vertical.label(), "topic": topic, "error": &error }),
            );
            trail.record(TrailEntry::PublishFailed {
                topic: topic.to_string(),
                error,
            });
            None
        }
    }
}
