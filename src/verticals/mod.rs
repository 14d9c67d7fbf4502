//! The four city coordinators: what each asks its sub-agents, the envelope it
//! must return and where its digests are published.

pub mod energy;
pub mod events;
pub mod pothole;
pub mod traffic;

use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::agents::SubAgentSpec;
use crate::inbound::AreaRequest;
use crate::pipeline::DigestSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Vertical {
    Traffic,
    Energy,
    Events,
    Pothole,
}

impl Vertical {
    pub const ALL: [Vertical; 4] = [
        Vertical::Traffic,
        Vertical::Energy,
        Vertical::Events,
        Vertical::Pothole,
    ];

    /// Verticals that report on an area rather than a single photo.
    pub const AREA_DIGESTS: [Vertical; 3] = [Vertical::Traffic, Vertical::Energy, Vertical::Events];

    pub fn parse(name: &str) -> Result<Self> {
        Self::from_str(name.trim(), true).map_err(|_| {
            anyhow::anyhow!(
                "unknown vertical '{}'. Supported values: traffic, energy, events, pothole",
                name
            )
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Vertical::Traffic => "traffic",
            Vertical::Energy => "energy",
            Vertical::Events => "events",
            Vertical::Pothole => "pothole",
        }
    }

    pub fn coordinator_name(self) -> &'static str {
        match self {
            Vertical::Traffic => "traffic_coordinator",
            Vertical::Energy => "energy_coordinator",
            Vertical::Events => "event_coordinator",
            Vertical::Pothole => "pothole_coordinator",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Vertical::Traffic => traffic::DESCRIPTION,
            Vertical::Energy => energy::DESCRIPTION,
            Vertical::Events => events::DESCRIPTION,
            Vertical::Pothole => pothole::DESCRIPTION,
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Vertical::Traffic => traffic::INSTRUCTION,
            Vertical::Energy => energy::INSTRUCTION,
            Vertical::Events => events::INSTRUCTION,
            Vertical::Pothole => pothole::INSTRUCTION,
        }
    }

    pub fn sub_agents(self) -> &'static [SubAgentSpec] {
        match self {
            Vertical::Traffic => traffic::SUB_AGENTS,
            Vertical::Energy => energy::SUB_AGENTS,
            Vertical::Events => events::SUB_AGENTS,
            Vertical::Pothole => pothole::SUB_AGENTS,
        }
    }

    pub fn schema(self) -> DigestSchema {
        match self {
            Vertical::Traffic => traffic::schema(),
            Vertical::Energy => energy::schema(),
            Vertical::Events => events::schema(),
            Vertical::Pothole => pothole::schema(),
        }
    }

    pub fn build_prompt(self, request: &AreaRequest) -> Result<String> {
        match self {
            Vertical::Traffic => Ok(traffic::prompt(request)),
            Vertical::Energy => Ok(energy::prompt(request)),
            Vertical::Events => Ok(events::prompt(request, chrono::Local::now().date_naive())),
            Vertical::Pothole => pothole::prompt(request),
        }
    }

    pub fn default_topic(self) -> &'static str {
        match self {
            Vertical::Traffic => "traffic-digest",
            Vertical::Energy => "energy-digest",
            Vertical::Events => "events-digest",
            Vertical::Pothole => "pothole-detection",
        }
    }
}

impl std::fmt::Display for Vertical {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub(crate) fn coordinates_clause(request: &AreaRequest) -> String {
    match request.coordinates() {
        Some((lat, lon)) => format!("My current location is {lat}, {lon}. "),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_any_case_and_rejects_unknown() {
        assert_eq!(Vertical::parse("Energy").expect("known vertical"), Vertical::Energy);
        let err = Vertical::parse("water").expect_err("unknown vertical must fail");
        assert!(err.to_string().contains("unknown vertical 'water'"));
    }

    #[test]
    fn every_vertical_declares_its_own_primary_key_and_sub_agents() {
        let mut keys = Vertical::ALL
            .iter()
            .map(|vertical| vertical.schema().primary_key)
            .collect::<Vec<_>>();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Vertical::ALL.len());

        for vertical in Vertical::ALL {
            assert!(!vertical.sub_agents().is_empty(), "{vertical} has no sub-agents");
            assert!(
                vertical.instruction().contains(&vertical.schema().primary_key),
                "{vertical} instruction should name its primary key"
            );
        }
    }
}
