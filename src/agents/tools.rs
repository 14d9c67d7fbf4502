/// Sub-agent tool - Exposes a search sub-agent to a coordinator as a callable tool.
use adk_rust::prelude::*;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use super::SubAgentSpec;
use crate::runner::invoke_agent;
use crate::telemetry::TelemetrySink;

pub struct SubAgentTool {
    spec: SubAgentSpec,
    agent: Arc<dyn Agent>,
    app_name: String,
    user_id: String,
    telemetry: TelemetrySink,
}

impl SubAgentTool {
    pub fn new(
        spec: SubAgentSpec,
        agent: Arc<dyn Agent>,
        app_name: &str,
        user_id: &str,
        telemetry: TelemetrySink,
    ) -> Self {
        Self {
            spec,
            agent,
            app_name: app_name.to_string(),
            user_id: user_id.to_string(),
            telemetry,
        }
    }
}

#[async_trait]
impl Tool for SubAgentTool {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn description(&self) -> &str {
        self.spec.description
    }

    fn parameters_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "request": {
                    "type": "string",
                    "description": "What to look up: area names, coordinates, time window."
                }
            },
            "required": ["request"]
        }))
    }

    async fn execute(&self, _ctx: Arc<dyn ToolContext>, args: Value) -> adk_rust::Result<Value> {
        let request = match args.get("request") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => args.to_string(),
        };
        if request.trim().is_empty() {
            return Ok(json!({"error": "request is required"}));
        }

        tracing::debug!(sub_agent = self.spec.name, request = %request, "invoking sub-agent");
        let reply = invoke_agent(
            self.agent.clone(),
            self.spec.name,
            &self.app_name,
            &self.user_id,
            &request,
            &self.telemetry,
        )
        .await
        .map_err(|e| adk_rust::AdkError::Tool(format!("sub-agent '{}': {e:#}", self.spec.name)))?;

        Ok(json!({ "result": reply }))
    }
}
