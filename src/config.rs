use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::{Cli, Provider, PublishBackend};
use crate::coordinator::RetryPolicy;
use crate::verticals::Vertical;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub app_name: String,
    pub user_id: String,
    pub topic_override: Option<String>,
    pub topics: HashMap<String, String>,
    pub publish_backend: PublishBackend,
    pub publish_path: String,
    pub retry: RetryPolicy,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
}

impl RuntimeConfig {
    /// Publish topic for `vertical`: the CLI override, then the profile's
    /// `[profiles.<name>.topics]` entry, then the vertical's default.
    pub fn topic_for(&self, vertical: Vertical) -> String {
        self.topic_override
            .clone()
            .or_else(|| self.topics.get(vertical.label()).cloned())
            .unwrap_or_else(|| vertical.default_topic().to_string())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub app_name: Option<String>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub topics: HashMap<String, String>,
    pub publish_backend: Option<PublishBackend>,
    pub publish_path: Option<String>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    toml::from_str::<ProfilesFile>(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check field names and enum values.",
            path.display()
        )
    })
}

pub fn resolve_runtime_config(cli: &Cli, profiles: &ProfilesFile) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    for key in profile.topics.keys() {
        Vertical::parse(key).with_context(|| {
            format!("invalid topics table in profile '{selected}'")
        })?;
    }

    let provider = if cli.provider != Provider::Auto {
        cli.provider
    } else {
        profile.provider.unwrap_or(Provider::Auto)
    };

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        provider,
        model: cli.model.clone().or(profile.model),
        app_name: cli
            .app_name
            .clone()
            .or(profile.app_name)
            .unwrap_or_else(|| "omni-digest".to_string()),
        user_id: cli
            .user_id
            .clone()
            .or(profile.user_id)
            .unwrap_or_else(|| "omni-user".to_string()),
        topic_override: cli.topic.clone(),
        topics: profile.topics,
        publish_backend: cli
            .publish_backend
            .or(profile.publish_backend)
            .unwrap_or(PublishBackend::Stdout),
        publish_path: cli
            .publish_path
            .clone()
            .or(profile.publish_path)
            .unwrap_or_else(|| ".omni/published.jsonl".to_string()),
        retry: RetryPolicy {
            max_attempts: cli
                .retry_attempts
                .or(profile.retry_attempts)
                .unwrap_or(1)
                .max(1),
            delay_ms: cli
                .retry_delay_ms
                .or(profile.retry_delay_ms)
                .unwrap_or(500),
        },
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(true),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".omni/telemetry/events.jsonl".to_string()),
    })
}
