#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Provider,
    Upstream,
    Input,
    Publish,
    Internal,
}

impl ErrorCategory {
    pub fn code(self) -> &'static str {
        match self {
            ErrorCategory::Provider => "PROVIDER",
            ErrorCategory::Upstream => "UPSTREAM",
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Publish => "PUBLISH",
            ErrorCategory::Internal => "INTERNAL",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            ErrorCategory::Provider => {
                "Set provider credentials (for example GOOGLE_API_KEY) or run with --provider ollama."
            }
            ErrorCategory::Upstream => {
                "The coordinator produced no usable reply. Retry, or raise --retry-attempts."
            }
            ErrorCategory::Input => "Run omni-digest --help and correct the command arguments or payload.",
            ErrorCategory::Publish => {
                "Check --publish-backend/--publish-path and that the target is writable."
            }
            ErrorCategory::Internal => {
                "Retry with OMNI_LOG=debug. If it persists, capture logs and open an issue."
            }
        }
    }
}

pub fn categorize_error(err: &anyhow::Error) -> ErrorCategory {
    let msg = format!("{err:#}").to_ascii_lowercase();

    if msg.contains("api_key")
        || msg.contains("no provider could be auto-detected")
        || msg.contains("provider")
    {
        return ErrorCategory::Provider;
    }

    if msg.contains("invalid value")
        || msg.contains("failed to read input")
        || msg.contains("profile")
        || msg.contains("envelope")
        || msg.contains("area request")
        || msg.contains("unknown vertical")
    {
        return ErrorCategory::Input;
    }

    if msg.contains("publish") {
        return ErrorCategory::Publish;
    }

    if msg.contains("final response")
        || msg.contains("runner")
        || msg.contains("coordinator")
        || msg.contains("sub-agent")
    {
        return ErrorCategory::Upstream;
    }

    ErrorCategory::Internal
}

pub fn format_cli_error(err: &anyhow::Error) -> String {
    let category = categorize_error(err);
    format!("[{}] {:#}\nHint: {}", category.code(), err, category.hint())
}
