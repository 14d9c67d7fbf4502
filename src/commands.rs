use std::io::Read;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use serde_json::{Value, json};

use crate::cli::AreaArgs;
use crate::config::RuntimeConfig;
use crate::fanout::fan_out;
use crate::inbound::AreaRequest;
use crate::pipeline::{Digest, normalize_reply};
use crate::server::run_server;
use crate::service::{DigestRun, DigestService};
use crate::telemetry::TelemetrySink;
use crate::trail::ResponseTrail;
use crate::verticals::Vertical;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}

fn print_trail(label: &str, trail: &ResponseTrail) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(&trail.summary()).context("failed to render trail")?;
    eprintln!("--- trail: {label} ---\n{rendered}");
    Ok(())
}

// Digests keyed by vertical label, in fan-out order.
struct CombinedDigests<'a>(&'a [(String, DigestRun)]);

impl Serialize for CombinedDigests<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, run) in self.0 {
            map.serialize_entry(label, &run.digest)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct HandleOutput<'a> {
    vertical: &'static str,
    message_id: Option<&'a str>,
    digest: &'a Digest,
}

pub async fn run_single(
    service: &DigestService,
    vertical: Vertical,
    area: AreaArgs,
    prompt: Option<String>,
    publish: bool,
    show_trail: bool,
) -> Result<DigestRun> {
    let prompt = match prompt.filter(|text| !text.trim().is_empty()) {
        Some(text) => text,
        None => vertical.build_prompt(&AreaRequest::from(area))?,
    };
    let run = service.run_and_publish(vertical, &prompt, publish).await?;

    print_json(&run.digest)?;
    if show_trail {
        print_trail(vertical.label(), &run.trail)?;
    }
    Ok(run)
}

/// Runs every area digest for one request concurrently. Only fails when no
/// coordinator produced a digest.
pub async fn run_all(
    service: &DigestService,
    area: AreaArgs,
    publish: bool,
    show_trail: bool,
) -> Result<Vec<DigestRun>> {
    let request = AreaRequest::from(area);
    let branches = Vertical::AREA_DIGESTS
        .into_iter()
        .map(|vertical| {
            let request = &request;
            (vertical.label().to_string(), async move {
                service.run_request(vertical, request, publish).await
            })
        })
        .collect::<Vec<_>>();
    let outcome = fan_out(branches).await;

    print_json(&CombinedDigests(&outcome.succeeded))?;

    for (label, err) in &outcome.failed {
        eprintln!("[{label}] coordinator failed: {err:#}");
    }
    if show_trail {
        for (label, run) in &outcome.succeeded {
            print_trail(label, &run.trail)?;
        }
    }

    if outcome.all_failed() {
        return Err(anyhow::anyhow!(
            "every coordinator failed ({})",
            outcome
                .failed
                .iter()
                .map(|(label, _)| label.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    Ok(outcome.succeeded.into_iter().map(|(_, run)| run).collect())
}

pub fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file '{path}'")),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read input from stdin")?;
            Ok(text)
        }
    }
}

/// Offline pipeline over a saved reply. Needs no provider.
pub fn run_normalize(
    vertical: Vertical,
    input: Option<&str>,
    telemetry: &TelemetrySink,
) -> Result<ResponseTrail> {
    let raw = read_input(input)?;
    let mut trail = ResponseTrail::new();
    let digest = normalize_reply(&raw, &vertical.schema(), &mut trail);
    telemetry.emit_trail(vertical.label(), &trail);

    print_json(&digest)?;
    if !trail.is_empty() {
        print_trail(vertical.label(), &trail)?;
    }
    Ok(trail)
}

pub async fn run_handle(
    service: &DigestService,
    vertical: Vertical,
    envelope_path: &str,
) -> Result<DigestRun> {
    let body = std::fs::read_to_string(envelope_path)
        .with_context(|| format!("failed to read input envelope '{envelope_path}'"))?;
    let run = service.handle_envelope(vertical, &body).await?;
    print_json(&HandleOutput {
        vertical: vertical.label(),
        message_id: run.message_id.as_deref(),
        digest: &run.digest,
    })?;
    Ok(run)
}

pub fn run_schema(cfg: &RuntimeConfig, vertical: Vertical) -> Result<()> {
    let sub_agents = vertical
        .sub_agents()
        .iter()
        .map(|spec| json!({ "name": spec.name, "description": spec.description }))
        .collect::<Vec<Value>>();
    print_json(&json!({
        "vertical": vertical.label(),
        "coordinator": vertical.coordinator_name(),
        "topic": cfg.topic_for(vertical),
        "sub_agents": sub_agents,
        "envelope": vertical.schema().describe(),
    }))
}

pub async fn run_serve(service: DigestService, host: String, port: u16) -> Result<()> {
    run_server(service, host, port).await
}
