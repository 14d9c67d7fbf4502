use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use crate::verticals::Vertical;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Auto,
    Gemini,
    Openai,
    Anthropic,
    Deepseek,
    Groq,
    Ollama,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishBackend {
    Stdout,
    Jsonl,
    Disabled,
}

/// Where and what to report on. Mirrors the fields of an inbound push message.
#[derive(Debug, Clone, Default, Args)]
pub struct AreaArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub lat: Option<f64>,

    #[arg(long, allow_hyphen_values = true)]
    pub lon: Option<f64>,

    #[arg(long = "area")]
    pub areas: Vec<String>,

    #[arg(long)]
    pub image: Option<String>,

    #[arg(long)]
    pub location: Option<String>,
}

const CLI_EXAMPLES: &str = "Examples:\n\
  omni-digest run traffic --lat 12.9716 --lon 77.5946 --area Koramangala --area \"HSR Layout\"\n\
  omni-digest run energy --area Indiranagar --publish\n\
  omni-digest run pothole --image https://example.com/road.jpg --lat 12.93 --lon 77.62\n\
  omni-digest run-all --area Whitefield --trail\n\
  omni-digest normalize energy --input saved-reply.txt\n\
  omni-digest handle events --envelope push.json\n\
  omni-digest serve --host 0.0.0.0 --port 8080\n\
  omni-digest schema traffic";

#[derive(Debug, Parser)]
#[command(name = "omni-digest")]
#[command(about = "City coordinator agents that turn search-grounded replies into validated digests")]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    #[arg(long, env = "OMNI_PROVIDER", value_enum, default_value_t = Provider::Auto)]
    pub provider: Provider,

    #[arg(long, env = "OMNI_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "OMNI_PROFILE", default_value = "default")]
    pub profile: String,

    #[arg(long, env = "OMNI_CONFIG", default_value = ".omni/config.toml")]
    pub config_path: String,

    #[arg(long, env = "OMNI_APP_NAME")]
    pub app_name: Option<String>,

    #[arg(long, env = "OMNI_USER_ID")]
    pub user_id: Option<String>,

    /// Overrides the publish topic of single-vertical commands.
    #[arg(long, env = "OMNI_TOPIC")]
    pub topic: Option<String>,

    #[arg(long, env = "OMNI_PUBLISH_BACKEND", value_enum)]
    pub publish_backend: Option<PublishBackend>,

    #[arg(long, env = "OMNI_PUBLISH_PATH")]
    pub publish_path: Option<String>,

    #[arg(long, env = "OMNI_RETRY_ATTEMPTS")]
    pub retry_attempts: Option<u32>,

    #[arg(long, env = "OMNI_RETRY_DELAY_MS")]
    pub retry_delay_ms: Option<u64>,

    #[arg(long, env = "OMNI_TELEMETRY_ENABLED", action = clap::ArgAction::Set)]
    pub telemetry_enabled: Option<bool>,

    #[arg(long, env = "OMNI_TELEMETRY_PATH")]
    pub telemetry_path: Option<String>,

    #[arg(long, env = "OMNI_LOG", default_value = "warn")]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Run one coordinator and print its digest")]
    Run {
        #[arg(value_enum)]
        vertical: Vertical,
        #[command(flatten)]
        area: AreaArgs,
        /// Send this prompt verbatim instead of building one from the area flags.
        #[arg(long)]
        prompt: Option<String>,
        #[arg(long, default_value_t = false)]
        publish: bool,
        /// Print the request trail to stderr after the digest.
        #[arg(long, default_value_t = false)]
        trail: bool,
    },
    #[command(about = "Run the traffic, energy and events coordinators concurrently")]
    RunAll {
        #[command(flatten)]
        area: AreaArgs,
        #[arg(long, default_value_t = false)]
        publish: bool,
        #[arg(long, default_value_t = false)]
        trail: bool,
    },
    #[command(about = "Normalize a saved model reply offline (reads stdin without --input)")]
    Normalize {
        #[arg(value_enum)]
        vertical: Vertical,
        #[arg(long)]
        input: Option<String>,
    },
    #[command(about = "Process one push envelope file and publish the digest")]
    Handle {
        #[arg(value_enum)]
        vertical: Vertical,
        #[arg(long)]
        envelope: String,
    },
    #[command(about = "Run the push endpoint server")]
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    #[command(about = "Print the digest envelope a vertical produces")]
    Schema {
        #[arg(value_enum)]
        vertical: Vertical,
    },
}

pub fn command_label(command: &Commands) -> String {
    match command {
        Commands::Run { vertical, .. } => format!("run.{}", vertical.label()),
        Commands::RunAll { .. } => "run-all".to_string(),
        Commands::Normalize { vertical, .. } => format!("normalize.{}", vertical.label()),
        Commands::Handle { vertical, .. } => format!("handle.{}", vertical.label()),
        Commands::Serve { .. } => "serve".to_string(),
        Commands::Schema { vertical } => format!("schema.{}", vertical.label()),
    }
}
