use anyhow::Result;
use clap::Parser;
use tracing::level_filters::LevelFilter;

use omni_digest::cli::{Cli, Commands, command_label};
use omni_digest::commands::{run_all, run_handle, run_normalize, run_schema, run_serve, run_single};
use omni_digest::config::{load_profiles, resolve_runtime_config};
use omni_digest::error::{categorize_error, format_cli_error};
use omni_digest::service::DigestService;
use omni_digest::telemetry::TelemetrySink;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = run_cli(cli).await {
        eprintln!("{}", format_cli_error(&err));
        tracing::error!(category = %categorize_error(&err).code(), error = %format!("{err:#}"), "command failed");
        std::process::exit(1);
    }

    Ok(())
}

async fn run_cli(cli: Cli) -> Result<()> {
    init_tracing(&cli.log_filter)?;
    let profiles = load_profiles(&cli.config_path)?;
    let cfg = resolve_runtime_config(&cli, &profiles)?;
    let telemetry = TelemetrySink::new(&cfg, command_label(&cli.command));
    tracing::debug!(
        profile = %cfg.profile,
        provider = ?cfg.provider,
        publish_backend = ?cfg.publish_backend,
        retry_attempts = cfg.retry.max_attempts,
        "resolved runtime config"
    );

    match cli.command {
        Commands::Run {
            vertical,
            area,
            prompt,
            publish,
            trail,
        } => {
            let service = DigestService::from_config(cfg, telemetry)?;
            run_single(&service, vertical, area, prompt, publish, trail).await?;
        }
        Commands::RunAll {
            area,
            publish,
            trail,
        } => {
            let service = DigestService::from_config(cfg, telemetry)?;
            run_all(&service, area, publish, trail).await?;
        }
        Commands::Normalize { vertical, input } => {
            run_normalize(vertical, input.as_deref(), &telemetry)?;
        }
        Commands::Handle { vertical, envelope } => {
            let service = DigestService::from_config(cfg, telemetry)?;
            run_handle(&service, vertical, &envelope).await?;
        }
        Commands::Serve { host, port } => {
            let service = DigestService::from_config(cfg, telemetry)?;
            run_serve(service, host, port).await?;
        }
        Commands::Schema { vertical } => {
            run_schema(&cfg, vertical)?;
        }
    }

    Ok(())
}

fn init_tracing(log_filter: &str) -> Result<()> {
    let level = log_filter
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(log_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))
}
