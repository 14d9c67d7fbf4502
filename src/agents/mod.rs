//! Search-grounded sub-agents and the tool that exposes them to a coordinator.

pub mod search;
pub mod tools;

/// Static description of one sub-agent a coordinator can call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubAgentSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub instruction: &'static str,
}
