use anyhow::{Result, bail};

use crate::agents::SubAgentSpec;
use crate::inbound::AreaRequest;
use crate::pipeline::{DigestSchema, FieldKind, FieldSpec, ListStyle, RecordSchema};

pub const DESCRIPTION: &str =
    "Detects potholes in a road photo and cross-checks them against Street View imagery";

pub const INSTRUCTION: &str = "You are the pothole detection coordinator.
When a photo is given, call pothole_analysis_agent to rate image clarity and pothole confidence.
When coordinates are known, call street_view_agent to check imagery around the point.
Combine both into one assessment; validation_confidence reflects how well they agree.

Return ONLY this JSON object, with no markdown:
{
  \"pothole_detection_result\": [
    {\"location\": \"12.9352,77.6245\", \"clarity_score\": 0.8, \"pothole_confidence\": 0.9,
     \"image_paths\": [\"https://...\"], \"streetview_confidence\": 0.7,
     \"validation_confidence\": 0.85, \"rationale\": \"Two deep potholes near the median\"}
  ]
}
Confidence and score values are numbers between 0 and 1.";

pub const SUB_AGENTS: &[SubAgentSpec] = &[
    SubAgentSpec {
        name: "pothole_analysis_agent",
        description: "Rates a road photo for clarity and pothole presence",
        instruction: "You receive a road-surface photo URL. Rate image clarity and the confidence \
                      that it shows a pothole, both between 0 and 1, and explain briefly.",
    },
    SubAgentSpec {
        name: "street_view_agent",
        description: "Looks for road damage in Street View imagery around a coordinate",
        instruction: "You receive a latitude and longitude. Look at the Street View imagery \
                      around that point and rate, between 0 and 1, how likely the road there \
                      has potholes. List the image URLs you relied on.",
    },
];

pub fn schema() -> DigestSchema {
    DigestSchema::new(
        "pothole_detection_result",
        RecordSchema::new(
            "pothole_assessment",
            vec![
                FieldSpec::required("location", FieldKind::Scalar),
                FieldSpec::optional("clarity_score", FieldKind::Number),
                FieldSpec::optional("pothole_confidence", FieldKind::Number),
                FieldSpec::optional("image_paths", FieldKind::ScalarList(ListStyle::Tokens)),
                FieldSpec::optional("streetview_confidence", FieldKind::Number),
                FieldSpec::optional("validation_confidence", FieldKind::Number),
                FieldSpec::required("rationale", FieldKind::Scalar),
            ],
        ),
    )
}

/// Needs a photo, coordinates, or both.
pub fn prompt(request: &AreaRequest) -> Result<String> {
    let image = request
        .image
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());
    let near = request
        .location
        .as_deref()
        .map(|place| format!(" near {place}"))
        .unwrap_or_default();

    let text = match (image, request.coordinates()) {
        (Some(url), Some((lat, lon))) => format!(
            "I took this road-surface photo ({url}) at {lat},{lon}{near}. Detect potholes, rate \
             image clarity, and validate using Street View if possible."
        ),
        (Some(url), None) => format!(
            "Here is a road-surface photo{near}: {url}. Detect potholes and validate with Street \
             View."
        ),
        (None, Some((lat, lon))) => format!(
            "At coordinates {lat},{lon}{near}, examine Street View around the point and assess \
             pothole likelihood."
        ),
        (None, None) => bail!("pothole area request needs an image or both lat and lon"),
    };
    Ok(text)
}
