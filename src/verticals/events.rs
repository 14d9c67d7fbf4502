use chrono::{Days, NaiveDate};

use crate::agents::SubAgentSpec;
use crate::inbound::AreaRequest;
use crate::pipeline::{DigestSchema, FieldKind, FieldSpec, RecordSchema};

pub const DESCRIPTION: &str = "Builds a week-ahead digest of cultural events in Bengaluru";

/// How far ahead the digest looks.
pub const WINDOW_DAYS: u64 = 7;

pub const INSTRUCTION: &str = "You are the Bengaluru cultural events coordinator.
Call cultural_events_agent with the requested areas and date range.
Drop events outside the range and duplicates listed by several sites.

Return ONLY this JSON object, with no markdown:
{
  \"cultural_events\": [
    {\"event_date\": \"2025-07-26\", \"event_time\": \"19:30\", \"title\": \"Carnatic evening\",
     \"venue\": \"Chowdiah Memorial Hall\", \"area\": \"Malleshwaram\", \"category\": \"Music\",
     \"price\": \"₹500\", \"link\": \"https://...\", \"description\": \"One line summary\"}
  ],
  \"bengaluru_events_digest\": [\"• Sat 26 Jul, 19:30 – Carnatic evening at Chowdiah Memorial Hall\"]
}
Every event value is a flat string; bengaluru_events_digest holds one bullet per line.";

pub const SUB_AGENTS: &[SubAgentSpec] = &[SubAgentSpec {
    name: "cultural_events_agent",
    description: "Concerts, theatre, exhibitions and festivals listed for Bengaluru",
    instruction: "Find cultural events (music, theatre, dance, art, festivals) listed for the \
                  requested Bengaluru areas and dates on ticketing sites, venue pages and local \
                  news. Return one line per event with date, time, title, venue, area, category, \
                  price and link.",
}];

pub fn schema() -> DigestSchema {
    let event = RecordSchema::new(
        "cultural_event",
        vec![
            FieldSpec::optional("event_date", FieldKind::Scalar),
            FieldSpec::optional("event_time", FieldKind::Scalar),
            FieldSpec::required("title", FieldKind::Scalar),
            FieldSpec::optional("venue", FieldKind::Scalar),
            FieldSpec::optional("area", FieldKind::Scalar),
            FieldSpec::optional("category", FieldKind::Scalar),
            FieldSpec::optional("price", FieldKind::Scalar),
            FieldSpec::optional("link", FieldKind::Scalar),
            FieldSpec::optional("description", FieldKind::Scalar),
        ],
    );
    DigestSchema::new("cultural_events", event).with_lines("bengaluru_events_digest")
}

pub fn prompt(request: &AreaRequest, today: NaiveDate) -> String {
    let until = today
        .checked_add_days(Days::new(WINDOW_DAYS))
        .unwrap_or(today);
    format!(
        "I'm in Bengaluru. Give me a concise bullet-point digest of upcoming cultural events {} \
         from {} to {}.",
        request.area_clause("across Bengaluru"),
        today.format("%Y-%m-%d"),
        until.format("%Y-%m-%d"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::normalize_reply;
    use crate::trail::ResponseTrail;

    #[test]
    fn prompt_spans_one_week() {
        let today = NaiveDate::from_ymd_opt(2025, 12, 28).expect("valid date");
        let request = AreaRequest {
            areas: vec!["Jayanagar".to_string()],
            ..AreaRequest::default()
        };
        assert_eq!(
            prompt(&request, today),
            "I'm in Bengaluru. Give me a concise bullet-point digest of upcoming cultural events \
             in Jayanagar from 2025-12-28 to 2026-01-04."
        );
    }

    #[test]
    fn digest_lines_lose_citation_markers() {
        let raw = r#"{
            "cultural_events": [{"title": "Yakshagana night", "venue": "Ravindra Kalakshetra"}],
            "bengaluru_events_digest": ["• Yakshagana night at Ravindra Kalakshetra [1, 4]", "  "]
        }"#;
        let mut trail = ResponseTrail::new();

        let digest = normalize_reply(raw, &schema(), &mut trail);

        assert_eq!(digest.records("cultural_events").len(), 1);
        assert_eq!(
            digest.lines("bengaluru_events_digest"),
            ["• Yakshagana night at Ravindra Kalakshetra".to_string()]
        );
    }

    #[test]
    fn missing_digest_section_is_empty() {
        let raw = r#"[{"title": "Open mic", "event_date": "2025-07-27"}]"#;
        let mut trail = ResponseTrail::new();

        let digest = normalize_reply(raw, &schema(), &mut trail);

        assert_eq!(digest.records("cultural_events").len(), 1);
        assert!(digest.lines("bengaluru_events_digest").is_empty());
        assert_eq!(
            digest.keys().collect::<Vec<_>>(),
            vec!["cultural_events", "bengaluru_events_digest"]
        );
    }
}
