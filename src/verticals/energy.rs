use crate::agents::SubAgentSpec;
use crate::inbound::AreaRequest;
use crate::pipeline::{DigestSchema, FieldKind, FieldSpec, ListStyle, RecordSchema};

pub const DESCRIPTION: &str = "Summarizes planned and unplanned BESCOM power outages for Bengaluru areas";

pub const INSTRUCTION: &str = "You are the Bengaluru power-outage coordinator.
Call bescom_agent with the requested areas and a 24 hour window.
Keep only outages that overlap the window, merge duplicates for the same area and time,
and prefer official BESCOM notices over news reports when they disagree.
If there are no outages, return an empty list.

Return ONLY this JSON object, with no markdown:
{
  \"outage_summary\": [
    {\"locations\": [\"Indiranagar\", \"HAL 2nd Stage\"],
     \"start_time\": \"2025-07-22T10:00:00+05:30\", \"end_time\": \"2025-07-22T17:00:00+05:30\",
     \"reason\": \"Preventive maintenance\"}
  ]
}
locations is a list with one area per element. Times are ISO 8601 with the +05:30 offset;
use null for an unknown end_time.";

pub const SUB_AGENTS: &[SubAgentSpec] = &[SubAgentSpec {
    name: "bescom_agent",
    description: "Official BESCOM outage notices and reliable local news about power cuts",
    instruction: "Find scheduled and unscheduled BESCOM power outages for the requested Bengaluru \
                  areas and time window. Use official BESCOM notices first and reliable local \
                  news second. Return a JSON array of objects with location, start_time, \
                  end_time and reason.",
}];

pub fn schema() -> DigestSchema {
    DigestSchema::new(
        "outage_summary",
        RecordSchema::new(
            "outage",
            vec![
                FieldSpec::required("locations", FieldKind::ScalarList(ListStyle::Tokens))
                    .with_alias("location"),
                FieldSpec::required("start_time", FieldKind::Scalar),
                FieldSpec::optional("end_time", FieldKind::Scalar),
                FieldSpec::required("reason", FieldKind::Scalar),
            ],
        ),
    )
}

pub fn prompt(request: &AreaRequest) -> String {
    let location = match request.coordinates() {
        Some((lat, lon)) => format!("My location is {lat}, {lon}. "),
        None => String::new(),
    };
    format!(
        "{location}Provide power-outage information for the next 24 hours {} including official \
         BESCOM notices and reliable local news reports.",
        request.area_clause("across Bengaluru"),
    )
}
