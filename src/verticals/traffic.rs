use crate::agents::SubAgentSpec;
use crate::inbound::AreaRequest;
use crate::pipeline::{DigestSchema, FieldKind, FieldSpec, RecordSchema};

use super::coordinates_clause;

pub const DESCRIPTION: &str =
    "Fuses BBMP, traffic police, social media and weather reports into a Bengaluru traffic digest";

pub const INSTRUCTION: &str = "You are the Bengaluru traffic coordinator.
Call bbmp_agent, btp_agent and social_media_agent with the requested areas and time window.
Collect the locations they mention and call weather_agent with that list.
Merge duplicate reports, rate severity (police-confirmed and multi-source reports rank higher,
adverse weather adds to severity) and sort by severity, then recency.
If nothing is reported, return a single update saying traffic is clear in the area.

Return ONLY this JSON object, with no markdown:
{
  \"bengaluru_traffic_digest\": [
    {\"timestamp\": \"21:00 IST\", \"location\": \"Silk Board Junction\",
     \"summary\": \"Heavy congestion due to construction\", \"severity_reason\": \"Moderate; multi-source\",
     \"delay\": \"20 min\", \"advice\": \"Use the service road\"}
  ],
  \"location_weather\": [
    {\"location\": \"Koramangala\", \"temperature\": \"28 °C\", \"conditions\": \"Clear skies\",
     \"precipitation\": \"0%\", \"wind\": \"5 km/h\"}
  ]
}
Every value is a flat string.";

pub const SUB_AGENTS: &[SubAgentSpec] = &[
    SubAgentSpec {
        name: "bbmp_agent",
        description: "BBMP civic works, road closures and pothole repairs affecting traffic today",
        instruction: "Find today's BBMP road works, closures and repair notices for the requested \
                      Bengaluru areas. Return one line per item: <HH:MM IST> – <Location>: <what> \
                      – Delay: <estimate> – Advice: <tip>.",
    },
    SubAgentSpec {
        name: "btp_agent",
        description: "Bengaluru Traffic Police advisories, diversions and incidents",
        instruction: "Find today's Bengaluru Traffic Police advisories, diversions and incidents for \
                      the requested areas. Return one line per item: <HH:MM IST> – <Location>: \
                      <what> – Delay: <estimate> – Advice: <tip>.",
    },
    SubAgentSpec {
        name: "social_media_agent",
        description: "Citizen traffic reports from social media in the last few hours",
        instruction: "Find citizen traffic reports posted in the last three hours for the requested \
                      Bengaluru areas. Ignore anything older. Return one line per report: \
                      <HH:MM IST> – <Location>: <what> (source).",
    },
    SubAgentSpec {
        name: "weather_agent",
        description: "Current weather for a list of Bengaluru locations",
        instruction: "You receive a list of Bengaluru locations. For each, return location, \
                      temperature, conditions, precipitation and wind as flat strings in a JSON \
                      array.",
    },
];

pub fn schema() -> DigestSchema {
    let update = RecordSchema::new(
        "traffic_update",
        vec![
            FieldSpec::optional("timestamp", FieldKind::Scalar),
            FieldSpec::required("location", FieldKind::Scalar),
            FieldSpec::required("summary", FieldKind::Scalar),
            FieldSpec::optional("severity_reason", FieldKind::Scalar),
            FieldSpec::optional("delay", FieldKind::Scalar),
            FieldSpec::optional("advice", FieldKind::Scalar),
        ],
    );
    let weather = RecordSchema::new(
        "weather_summary",
        vec![
            FieldSpec::required("location", FieldKind::Scalar),
            FieldSpec::optional("temperature", FieldKind::Scalar),
            FieldSpec::optional("conditions", FieldKind::Scalar),
            FieldSpec::optional("precipitation", FieldKind::Scalar),
            FieldSpec::optional("wind", FieldKind::Scalar),
        ],
    );
    DigestSchema::new("bengaluru_traffic_digest", update).with_records("location_weather", weather)
}

pub fn prompt(request: &AreaRequest) -> String {
    format!(
        "{}Provide traffic information for the current time {} including all data from BBMP, \
         BTP, social media, and weather.",
        coordinates_clause(request),
        request.area_clause("across Bengaluru"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize_reply;
    use crate::trail::ResponseTrail;

    #[test]
    fn prompt_names_coordinates_and_areas() {
        let request = AreaRequest {
            lat: Some(12.9716),
            lon: Some(77.5946),
            areas: vec!["Koramangala".to_string(), "ORR".to_string()],
            ..AreaRequest::default()
        };
        let text = prompt(&request);
        assert!(text.starts_with("My current location is 12.9716, 77.5946."));
        assert!(text.contains("in Koramangala, ORR"));
    }

    #[test]
    fn weather_side_table_survives_nested_values() {
        let raw = r#"Here is the digest:
```json
{"bengaluru_traffic_digest": [
   {"timestamp": "09:10 IST", "location": "Hebbal Flyover", "summary": "Slow moving",
    "delay": 15, "advice": "Take Bellary Road"}
 ],
 "location_weather": [
   {"weather_summary": {"location": "Hebbal", "temperature": "24 °C", "wind": {"speed": 12}}}
 ]}
```"#;
        let mut trail = ResponseTrail::new();
        let digest = normalize_reply(raw, &schema(), &mut trail);

        let updates = digest.records("bengaluru_traffic_digest");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].get("delay").and_then(|v| v.as_str()), Some("15"));

        let weather = digest.records("location_weather");
        assert_eq!(weather.len(), 1);
        assert_eq!(weather[0].get("wind").and_then(|v| v.as_str()), Some("{\"speed\":12}"));
        assert_eq!(trail.decode_failures(), 0);
    }
}
