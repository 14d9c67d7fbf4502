use serde::Serialize;
use serde_json::Value;

/// One diagnostic event in a request's trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrailEntry {
    ModelCall {
        agent: String,
        attempt: u32,
        prompt: String,
        reply: String,
    },
    DecodeFailed {
        excerpt: String,
    },
    RecordDropped {
        section: String,
        index: usize,
        record: Value,
        reason: String,
    },
    PublishFailed {
        topic: String,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrailRecord {
    pub at: String,
    #[serde(flatten)]
    pub entry: TrailEntry,
}

/// Per-request accumulator of model calls and pipeline diagnostics.
///
/// Created by whoever starts a request and passed down explicitly; it never
/// outlives that request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseTrail {
    records: Vec<TrailRecord>,
}

impl ResponseTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: TrailEntry) {
        self.records.push(TrailRecord {
            at: chrono::Utc::now().to_rfc3339(),
            entry,
        });
    }

    /// Records a model call, numbering attempts per agent from 1.
    pub fn record_model_call(&mut self, agent: &str, prompt: &str, reply: &str) {
        let previous = self
            .entries()
            .filter(|entry| matches!(entry, TrailEntry::ModelCall { agent: a, .. } if a == agent))
            .count();
        self.record(TrailEntry::ModelCall {
            agent: agent.to_string(),
            attempt: previous as u32 + 1,
            prompt: prompt.to_string(),
            reply: reply.to_string(),
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &TrailEntry> {
        self.records.iter().map(|record| &record.entry)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn model_calls(&self) -> usize {
        self.entries()
            .filter(|entry| matches!(entry, TrailEntry::ModelCall { .. }))
            .count()
    }

    pub fn dropped_records(&self) -> usize {
        self.entries()
            .filter(|entry| matches!(entry, TrailEntry::RecordDropped { .. }))
            .count()
    }

    pub fn decode_failures(&self) -> usize {
        self.entries()
            .filter(|entry| matches!(entry, TrailEntry::DecodeFailed { .. }))
            .count()
    }

    pub fn summary(&self) -> Value {
        serde_json::json!({
            "total_model_calls": self.model_calls(),
            "decode_failures": self.decode_failures(),
            "dropped_records": self.dropped_records(),
            "entries": self.records,
        })
    }
}
