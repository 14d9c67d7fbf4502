use std::sync::Arc;

use adk_rust::prelude::*;
use anyhow::Result;

use super::SubAgentSpec;

/// Builds a sub-agent from its spec. With `search` set the agent gets Gemini's
/// built-in Google Search tool; otherwise it answers from model knowledge.
pub fn build_search_agent(
    spec: &SubAgentSpec,
    model: Arc<dyn Llm>,
    search: bool,
) -> Result<Arc<dyn Agent>> {
    let mut builder = LlmAgentBuilder::new(spec.name)
        .description(spec.description)
        .instruction(search_instruction(spec, search))
        .model(model);

    if search {
        builder = builder.tool(Arc::new(adk_tool::builtin::GoogleSearchTool::new()));
    }

    Ok(Arc::new(builder.build()?))
}

fn search_instruction(spec: &SubAgentSpec, search: bool) -> String {
    if search {
        format!(
            "{}\n\nUse the google_search tool for every request. Report only what the \
             results support and keep source names next to each fact.",
            spec.instruction
        )
    } else {
        format!(
            "{}\n\nLive search is unavailable. Answer from what you know, and return an \
             empty result rather than inventing current events.",
            spec.instruction
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: SubAgentSpec = SubAgentSpec {
        name: "bescom_agent",
        description: "BESCOM outage notices",
        instruction: "Find scheduled power outages.",
    };

    #[test]
    fn instruction_mentions_search_only_when_enabled() {
        assert!(search_instruction(&SPEC, true).contains("google_search"));
        let offline = search_instruction(&SPEC, false);
        assert!(offline.starts_with("Find scheduled power outages."));
        assert!(!offline.contains("google_search"));
    }
}
