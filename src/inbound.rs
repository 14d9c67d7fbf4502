//! Push-subscription envelopes and the area requests they carry.

use std::collections::HashMap;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::cli::AreaArgs;
use crate::pipeline::split_tokens;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PushMessage {
    /// Base64 of the JSON-encoded [`AreaRequest`].
    pub data: String,
    #[serde(default, alias = "messageId")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// What a coordinator should report on. Every field is optional; each
/// vertical decides which combination it needs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AreaRequest {
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "area_tokens")]
    pub areas: Vec<String>,
    #[serde(default, alias = "image_url")]
    pub image: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl AreaRequest {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.lat.zip(self.lon)
    }

    /// "in A, B" when areas were given, otherwise `fallback`.
    pub fn area_clause(&self, fallback: &str) -> String {
        if self.areas.is_empty() {
            fallback.to_string()
        } else {
            format!("in {}", self.areas.join(", "))
        }
    }
}

impl From<AreaArgs> for AreaRequest {
    fn from(args: AreaArgs) -> Self {
        Self {
            lat: args.lat,
            lon: args.lon,
            areas: args.areas.iter().flat_map(|area| split_tokens(area)).collect(),
            image: args.image,
            location: args.location,
        }
    }
}

impl PushEnvelope {
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).context("push envelope is not valid JSON")
    }

    pub fn area_request(&self) -> Result<AreaRequest> {
        let bytes = STANDARD
            .decode(self.message.data.trim())
            .context("push envelope data is not valid base64")?;
        serde_json::from_slice::<AreaRequest>(&bytes)
            .context("push envelope data is not a valid area request")
    }

    pub fn wrap(request: &AreaRequest, message_id: Option<String>) -> Result<Self> {
        let payload = serde_json::to_vec(request).context("failed to serialize area request")?;
        Ok(Self {
            message: PushMessage {
                data: STANDARD.encode(payload),
                message_id,
                attributes: HashMap::new(),
            },
            subscription: None,
        })
    }
}

fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let parsed = match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) if text.trim().is_empty() => None,
        Some(Value::String(text)) => Some(text.trim().parse::<f64>().map_err(|_| {
            serde::de::Error::custom(format!("coordinate '{text}' is not a number"))
        })?),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "coordinate must be a number, got {other}"
            )));
        }
    };
    Ok(parsed)
}

// Areas arrive as a list or as one joined string.
fn area_tokens<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let pieces = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => vec![text],
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => text,
                other => other.to_string(),
            })
            .collect(),
        Some(other) => vec![other.to_string()],
    };
    Ok(pieces.iter().flat_map(|piece| split_tokens(piece)).collect())
}
