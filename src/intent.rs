//! Intent model and parser.
//!
//! An intent is a closed, declarative record of desired topology
//! properties. The parser normalizes it into measurable constraints that
//! drive synthesis and validation. Unknown fields are rejected at
//! deserialization; domain violations surface as `InvalidIntent` with a
//! corrective hint.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Structural families the synthesizer knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    FullMesh,
    HubSpoke,
    Ring,
    Tree,
    LeafSpine,
    Hybrid,
}

impl Pattern {
    /// All patterns, in the order the recommender considers them.
    pub const ALL: [Pattern; 6] = [
        Pattern::FullMesh,
        Pattern::HubSpoke,
        Pattern::Ring,
        Pattern::Tree,
        Pattern::LeafSpine,
        Pattern::Hybrid,
    ];

    /// Stable label used in persistence and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::FullMesh => "full_mesh",
            Pattern::HubSpoke => "hub_spoke",
            Pattern::Ring => "ring",
            Pattern::Tree => "tree",
            Pattern::LeafSpine => "leaf_spine",
            Pattern::Hybrid => "hybrid",
        }
    }

    pub fn from_str_label(label: &str) -> Option<Pattern> {
        match label {
            "full_mesh" => Some(Pattern::FullMesh),
            "hub_spoke" => Some(Pattern::HubSpoke),
            "ring" => Some(Pattern::Ring),
            "tree" => Some(Pattern::Tree),
            "leaf_spine" => Some(Pattern::LeafSpine),
            "hybrid" => Some(Pattern::Hybrid),
            _ => None,
        }
    }
}

/// Redundancy requirement, mapped to a target edge-disjoint-path count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedundancyLevel {
    Minimum,
    Standard,
    High,
    Critical,
}

impl RedundancyLevel {
    /// Target number of edge-disjoint paths between any device pair.
    pub fn target_paths(&self) -> u32 {
        match self {
            RedundancyLevel::Minimum => 1,
            RedundancyLevel::Standard => 2,
            RedundancyLevel::High => 3,
            RedundancyLevel::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RedundancyLevel::Minimum => "minimum",
            RedundancyLevel::Standard => "standard",
            RedundancyLevel::High => "high",
            RedundancyLevel::Critical => "critical",
        }
    }
}

/// Routing protocol tag. Only OSPF is implemented by the core; the other
/// variants parse so that intents can be stored verbatim, but synthesis
/// rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Ospf,
    Bgp,
    Isis,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Ospf => "ospf",
            Protocol::Bgp => "bgp",
            Protocol::Isis => "isis",
        }
    }
}

/// Primary optimization axis for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignGoal {
    Cost,
    Redundancy,
    Latency,
    Scalability,
}

impl DesignGoal {
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignGoal::Cost => "cost",
            DesignGoal::Redundancy => "redundancy",
            DesignGoal::Latency => "latency",
            DesignGoal::Scalability => "scalability",
        }
    }
}

/// Declarative intent. Immutable once handed to the synthesizer; stored
/// verbatim in history for reproducibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Intent {
    /// Human-readable name, also used to seed reproducible sampling.
    pub name: String,
    /// Requested structural family. Absent means "recommend one for me".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    #[serde(default = "default_site_count")]
    pub site_count: u32,
    #[serde(default = "default_redundancy")]
    pub redundancy: RedundancyLevel,
    /// Diameter ceiling in hops.
    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    #[serde(default = "default_design_goal")]
    pub design_goal: DesignGoal,
    #[serde(default = "default_minimize_spof")]
    pub minimize_spof: bool,
    /// Minimum redundant connections per device.
    #[serde(default = "default_min_connections")]
    pub min_connections_per_site: u32,
}

fn default_site_count() -> u32 {
    10
}

fn default_redundancy() -> RedundancyLevel {
    RedundancyLevel::Standard
}

fn default_max_hops() -> u32 {
    4
}

fn default_protocol() -> Protocol {
    Protocol::Ospf
}

fn default_design_goal() -> DesignGoal {
    DesignGoal::Redundancy
}

fn default_minimize_spof() -> bool {
    true
}

fn default_min_connections() -> u32 {
    2
}

impl Intent {
    /// Minimal intent with the documented field defaults.
    pub fn named(name: &str) -> Intent {
        Intent {
            name: name.to_string(),
            pattern: None,
            site_count: default_site_count(),
            redundancy: default_redundancy(),
            max_hops: default_max_hops(),
            protocol: default_protocol(),
            design_goal: default_design_goal(),
            minimize_spof: default_minimize_spof(),
            min_connections_per_site: default_min_connections(),
        }
    }
}

/// Concrete constraints derived from an intent. This is what the
/// synthesizer and validator actually consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentConstraints {
    /// Edge-disjoint-path target from the redundancy level alone. Drives
    /// synthesis augmentation.
    pub redundancy_target: u32,
    /// max(redundancy target, min_connections_per_site). Drives validator
    /// scoring, so an intent that asks for well-connected sites is scored
    /// against that ask even at redundancy = minimum.
    pub effective_target: u32,
    /// Diameter ceiling in hops.
    pub max_hops: u32,
    /// Whether zero SPOFs is a hard requirement.
    pub require_spof_free: bool,
    /// Pattern chosen by the caller, if any.
    pub pattern: Option<Pattern>,
}

/// Normalize an intent into constraints, rejecting out-of-domain fields.
pub fn parse_intent(intent: &Intent) -> Result<IntentConstraints, CoreError> {
    if intent.name.trim().is_empty() {
        return Err(CoreError::InvalidIntent {
            reason: "intent name is empty".into(),
            hint: "give the intent a non-empty name".into(),
        });
    }
    if intent.site_count < 2 {
        return Err(CoreError::InvalidIntent {
            reason: format!("site_count {} below minimum", intent.site_count),
            hint: "raise site_count to at least 2".into(),
        });
    }
    if intent.site_count > 500 {
        return Err(CoreError::InvalidIntent {
            reason: format!("site_count {} above maximum", intent.site_count),
            hint: "lower site_count to at most 500".into(),
        });
    }
    if intent.max_hops == 0 {
        return Err(CoreError::InvalidIntent {
            reason: "max_hops must be positive".into(),
            hint: "increase max_hops".into(),
        });
    }
    if intent.min_connections_per_site >= intent.site_count {
        return Err(CoreError::InvalidIntent {
            reason: format!(
                "min_connections_per_site {} cannot reach site_count {}",
                intent.min_connections_per_site, intent.site_count
            ),
            hint: "lower min_connections_per_site below site_count".into(),
        });
    }
    if intent.protocol != Protocol::Ospf {
        return Err(CoreError::InvalidIntent {
            reason: format!("protocol {} is not implemented", intent.protocol.as_str()),
            hint: "use protocol ospf".into(),
        });
    }

    let redundancy_target = intent.redundancy.target_paths();
    let effective_target = redundancy_target.max(intent.min_connections_per_site).max(1);

    log::debug!(
        "parsed intent '{}': target={} effective={} max_hops={} spof_free={}",
        intent.name,
        redundancy_target,
        effective_target,
        intent.max_hops,
        intent.minimize_spof
    );

    Ok(IntentConstraints {
        redundancy_target,
        effective_target,
        max_hops: intent.max_hops,
        require_spof_free: intent.minimize_spof,
        pattern: intent.pattern,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_intent() -> Intent {
        let mut intent = Intent::named("unit");
        intent.pattern = Some(Pattern::Ring);
        intent
    }

    #[test]
    fn redundancy_levels_map_to_path_targets() {
        assert_eq!(RedundancyLevel::Minimum.target_paths(), 1);
        assert_eq!(RedundancyLevel::Standard.target_paths(), 2);
        assert_eq!(RedundancyLevel::High.target_paths(), 3);
        assert_eq!(RedundancyLevel::Critical.target_paths(), 4);
    }

    #[test]
    fn pattern_labels_round_trip() {
        for pattern in Pattern::ALL {
            assert_eq!(Pattern::from_str_label(pattern.as_str()), Some(pattern));
        }
        assert_eq!(Pattern::from_str_label("star"), None);
    }

    #[test]
    fn parse_accepts_defaults() {
        let constraints = parse_intent(&base_intent()).unwrap();
        assert_eq!(constraints.redundancy_target, 2);
        assert_eq!(constraints.effective_target, 2);
        assert_eq!(constraints.max_hops, 4);
        assert!(constraints.require_spof_free);
    }

    #[test]
    fn effective_target_honors_min_connections() {
        let mut intent = base_intent();
        intent.redundancy = RedundancyLevel::Minimum;
        intent.min_connections_per_site = 3;
        let constraints = parse_intent(&intent).unwrap();
        assert_eq!(constraints.redundancy_target, 1);
        assert_eq!(constraints.effective_target, 3);
    }

    #[test]
    fn site_count_domain_is_enforced() {
        let mut intent = base_intent();
        intent.site_count = 1;
        assert!(matches!(
            parse_intent(&intent),
            Err(CoreError::InvalidIntent { .. })
        ));

        intent.site_count = 501;
        assert!(matches!(
            parse_intent(&intent),
            Err(CoreError::InvalidIntent { .. })
        ));
    }

    #[test]
    fn min_connections_must_be_reachable() {
        let mut intent = base_intent();
        intent.site_count = 2;
        intent.min_connections_per_site = 2;
        assert!(parse_intent(&intent).is_err());

        intent.min_connections_per_site = 1;
        let constraints = parse_intent(&intent).unwrap();
        assert_eq!(constraints.effective_target, 2); // standard redundancy still applies
    }

    #[test]
    fn non_ospf_protocols_are_rejected() {
        let mut intent = base_intent();
        intent.protocol = Protocol::Bgp;
        let err = parse_intent(&intent).unwrap_err();
        assert_eq!(err.kind(), "invalid_intent");
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut intent = base_intent();
        intent.name = "  ".into();
        let err = parse_intent(&intent).unwrap_err();
        assert_eq!(err.kind(), "invalid_intent");
    }

    #[test]
    fn unknown_yaml_fields_are_rejected() {
        let yaml = "name: bad\npattern: ring\nfancy_feature: true\n";
        let parsed: Result<Intent, _> = serde_yaml::from_str(yaml);
        assert!(parsed.is_err());
    }

    #[test]
    fn intent_round_trips_through_yaml() {
        let yaml = "name: branch-net\npattern: hub_spoke\nsite_count: 12\nredundancy: minimum\ndesign_goal: cost\nminimize_spof: false\n";
        let intent: Intent = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(intent.pattern, Some(Pattern::HubSpoke));
        assert_eq!(intent.site_count, 12);
        assert_eq!(intent.redundancy, RedundancyLevel::Minimum);
        assert_eq!(intent.max_hops, 4); // default
        assert!(!intent.minimize_spof);

        let json = serde_json::to_string(&intent).unwrap();
        let back: Intent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, intent);
    }
}
