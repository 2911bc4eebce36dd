//! Failure-scenario simulation.
//!
//! Removes nodes or edges from a copy of the topology graph and reports
//! what breaks: routes that lost their path, network partitions,
//! connectivity loss, and a coarse recovery estimate per scenario kind.
//! The input topology is never mutated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::analysis::RiskLevel;
use crate::error::CoreError;
use crate::graph::{stable_seed, Graph};
use crate::topology::Topology;

/// A failure to inject into the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureScenario {
    /// Remove one device and all incident links.
    NodeDown { device: String },
    /// Remove one specific link. The interface pair disambiguates
    /// parallel links; absent, the first link between the pair goes.
    LinkDown {
        source: String,
        destination: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        interfaces: Option<(String, String)>,
    },
    /// Remove several links at once.
    MultiLink { links: Vec<(String, String)> },
    /// Remove the seed device, then iteratively strip neighbors whose
    /// remaining degree drops below 1, up to `depth` waves.
    Cascade { seed_device: String, depth: u32 },
}

impl FailureScenario {
    /// Stable label persisted with simulation records.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureScenario::NodeDown { .. } => "node_down",
            FailureScenario::LinkDown { .. } => "link_down",
            FailureScenario::MultiLink { .. } => "multi_link",
            FailureScenario::Cascade { .. } => "cascade",
        }
    }

    /// OSPF reconvergence convention per scenario kind, in seconds. A
    /// fixed convention, not a physical simulation.
    pub fn recovery_estimate_secs(&self) -> u32 {
        match self {
            FailureScenario::NodeDown { .. } => 30,
            FailureScenario::LinkDown { .. } => 10,
            FailureScenario::MultiLink { .. } => 45,
            FailureScenario::Cascade { .. } => 60,
        }
    }
}

/// One device pair's routing before and after the failure.
#[derive(Debug, Clone, Serialize)]
pub struct AffectedRoute {
    pub source_device: String,
    pub destination_device: String,
    pub pre_failure_path: Vec<String>,
    pub reachable_after: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_failure_path: Option<Vec<String>>,
}

/// Outcome of injecting one failure scenario.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResult {
    pub topology_name: String,
    pub scenario: FailureScenario,
    /// Pairs that had a pre-failure path and lost it, with their original
    /// routes. Pairs whose endpoint was itself removed are not counted.
    pub broken_routes: Vec<AffectedRoute>,
    pub broken_pair_count: usize,
    pub reachable_pair_count: usize,
    /// broken / originally-reachable pairs, percent.
    pub connectivity_loss_pct: f64,
    pub partitioned: bool,
    pub components: Vec<Vec<String>>,
    /// Surviving devices stranded outside the largest component.
    pub isolated_count: usize,
    pub severity: RiskLevel,
    pub recovery_estimate_secs: u32,
}

/// Severity from connectivity loss, thresholds 50/25/10.
fn severity_from_loss(loss_pct: f64) -> RiskLevel {
    if loss_pct > 50.0 {
        RiskLevel::Critical
    } else if loss_pct > 25.0 {
        RiskLevel::High
    } else if loss_pct > 10.0 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Apply a scenario to a copy of the graph. Returns the mutated copy and
/// the set of removed device names.
fn apply_scenario(
    topology: &Topology,
    graph: &Graph,
    scenario: &FailureScenario,
) -> Result<(Graph, HashSet<String>), CoreError> {
    let mut post = graph.clone();
    let mut removed = HashSet::new();

    match scenario {
        FailureScenario::NodeDown { device } => {
            if !post.contains(device) {
                return Err(CoreError::InvalidScenario {
                    reason: format!("device '{}' does not exist", device),
                });
            }
            post.remove_node(device);
            removed.insert(device.clone());
        }
        FailureScenario::LinkDown {
            source,
            destination,
            interfaces,
        } => {
            let link_idx = topology
                .links
                .iter()
                .position(|l| {
                    let forward = l.source_device == *source && l.destination_device == *destination;
                    let reverse = l.source_device == *destination && l.destination_device == *source;
                    if !forward && !reverse {
                        return false;
                    }
                    match interfaces {
                        None => true,
                        Some((a, b)) => {
                            (forward && l.source_interface == *a && l.destination_interface == *b)
                                || (reverse
                                    && l.source_interface == *b
                                    && l.destination_interface == *a)
                        }
                    }
                })
                .ok_or_else(|| CoreError::InvalidScenario {
                    reason: format!("no link between '{}' and '{}'", source, destination),
                })?;
            post.remove_edge_for_link(link_idx);
        }
        FailureScenario::MultiLink { links } => {
            for (a, b) in links {
                if !post.remove_edge_between(a, b) {
                    return Err(CoreError::InvalidScenario {
                        reason: format!("no link between '{}' and '{}'", a, b),
                    });
                }
            }
        }
        FailureScenario::Cascade { seed_device, depth } => {
            if !post.contains(seed_device) {
                return Err(CoreError::InvalidScenario {
                    reason: format!("device '{}' does not exist", seed_device),
                });
            }
            post.remove_node(seed_device);
            removed.insert(seed_device.clone());
            for _ in 0..*depth {
                let stranded: Vec<String> = post
                    .node_names()
                    .iter()
                    .filter(|n| post.degree(n) == 0)
                    .map(|n| n.to_string())
                    .collect();
                if stranded.is_empty() {
                    break;
                }
                for name in stranded {
                    post.remove_node(&name);
                    removed.insert(name);
                }
            }
        }
    }

    Ok((post, removed))
}

/// Node name -> connected component index.
fn component_map(graph: &Graph) -> std::collections::HashMap<String, usize> {
    let mut map = std::collections::HashMap::new();
    for (idx, component) in graph.connected_components().into_iter().enumerate() {
        for name in component {
            map.insert(name, idx);
        }
    }
    map
}

/// Loss percentage via component membership; cheap enough to evaluate
/// once per removal candidate during scenario generation.
fn loss_pct(
    pre_components: &std::collections::HashMap<String, usize>,
    post: &Graph,
    removed: &HashSet<String>,
    pairs: &[(String, String)],
) -> f64 {
    let post_components = component_map(post);
    let mut reachable = 0usize;
    let mut broken = 0usize;
    for (a, b) in pairs {
        if removed.contains(a) || removed.contains(b) {
            continue;
        }
        match (pre_components.get(a), pre_components.get(b)) {
            (Some(x), Some(y)) if x == y => {}
            _ => continue,
        }
        reachable += 1;
        match (post_components.get(a), post_components.get(b)) {
            (Some(x), Some(y)) if x == y => {}
            _ => broken += 1,
        }
    }
    if reachable == 0 {
        0.0
    } else {
        (broken as f64 / reachable as f64 * 1000.0).round() / 10.0
    }
}

/// Simulate one failure scenario against a topology.
pub fn simulate(
    topology: &Topology,
    scenario: &FailureScenario,
) -> Result<SimulationResult, CoreError> {
    let pre = topology.to_graph();
    let (post, removed) = apply_scenario(topology, &pre, scenario)?;
    let pairs = pre.sample_pairs(stable_seed(&topology.name));

    let mut broken_routes = Vec::new();
    let mut reachable = 0usize;
    for (a, b) in &pairs {
        if removed.contains(a) || removed.contains(b) {
            continue;
        }
        let Some(pre_path) = pre.shortest_path(a, b) else {
            continue;
        };
        reachable += 1;
        let post_path = post.shortest_path(a, b);
        if post_path.is_none() {
            broken_routes.push(AffectedRoute {
                source_device: a.clone(),
                destination_device: b.clone(),
                pre_failure_path: pre_path,
                reachable_after: false,
                post_failure_path: post_path,
            });
        }
    }

    let broken = broken_routes.len();
    let loss = if reachable == 0 {
        0.0
    } else {
        (broken as f64 / reachable as f64 * 1000.0).round() / 10.0
    };

    let components = post.connected_components();
    let largest = components.iter().map(|c| c.len()).max().unwrap_or(0);
    let isolated_count = post.node_count().saturating_sub(largest);

    let result = SimulationResult {
        topology_name: topology.name.clone(),
        scenario: scenario.clone(),
        broken_pair_count: broken,
        reachable_pair_count: reachable,
        connectivity_loss_pct: loss,
        partitioned: components.len() > 1,
        components,
        isolated_count,
        severity: severity_from_loss(loss),
        recovery_estimate_secs: scenario.recovery_estimate_secs(),
        broken_routes,
    };

    log::info!(
        "simulated {} on '{}': loss {:.1}%, severity {}, partitioned {}",
        result.scenario.kind(),
        topology.name,
        result.connectivity_loss_pct,
        result.severity.as_str(),
        result.partitioned
    );
    Ok(result)
}

/// The three canonical scenarios: worst single-node failure, worst
/// single-link failure, worst two-link combination. "Worst" maximizes
/// connectivity loss; ties break lexicographically on element name.
pub fn generate_test_scenarios(topology: &Topology) -> Vec<FailureScenario> {
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    let pre = topology.to_graph();
    let seed = stable_seed(&topology.name);
    let pairs = pre.sample_pairs(seed);
    let pre_components = component_map(&pre);
    let mut scenarios = Vec::new();

    // Worst single node.
    let mut device_names: Vec<&str> = topology.devices.iter().map(|d| d.name.as_str()).collect();
    device_names.sort();
    let mut worst_node: Option<(f64, &str)> = None;
    for &name in &device_names {
        let mut post = pre.clone();
        post.remove_node(name);
        let removed = HashSet::from([name.to_string()]);
        let loss = loss_pct(&pre_components, &post, &removed, &pairs);
        if worst_node.map_or(true, |(best, _)| loss > best) {
            worst_node = Some((loss, name));
        }
    }
    if let Some((_, name)) = worst_node {
        scenarios.push(FailureScenario::NodeDown {
            device: name.to_string(),
        });
    }

    // Worst single link, over canonical endpoint pairs. Very large link
    // sets fall back to a reproducible sample, like every other pairwise
    // sweep on big topologies.
    let empty = HashSet::new();
    let mut link_keys: Vec<(String, String)> = topology
        .links
        .iter()
        .map(|l| l.endpoints())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    link_keys.sort();
    if link_keys.len() > 200 {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        link_keys.shuffle(&mut rng);
        link_keys.truncate(200);
        link_keys.sort();
    }
    let link_loss = |cut: &[&(String, String)]| -> f64 {
        let mut post = pre.clone();
        for (a, b) in cut {
            post.remove_edge_between(a, b);
        }
        loss_pct(&pre_components, &post, &empty, &pairs)
    };
    let mut worst_link: Option<(f64, &(String, String))> = None;
    for key in &link_keys {
        let loss = link_loss(&[key]);
        if worst_link.map_or(true, |(best, _)| loss > best) {
            worst_link = Some((loss, key));
        }
    }
    if let Some((_, (a, b))) = worst_link {
        scenarios.push(FailureScenario::LinkDown {
            source: a.clone(),
            destination: b.clone(),
            interfaces: None,
        });
    }

    // Worst two-link combination. Large graphs search only among the
    // dozen worst single links to keep the candidate set quadratic-safe.
    if link_keys.len() >= 2 {
        let candidates: Vec<(String, String)> = if link_keys.len() > 60 {
            let mut ranked: Vec<(f64, (String, String))> = link_keys
                .iter()
                .map(|key| (link_loss(&[key]), key.clone()))
                .collect();
            ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
            ranked.into_iter().take(12).map(|(_, k)| k).collect()
        } else {
            link_keys.clone()
        };

        let mut sorted_candidates = candidates;
        sorted_candidates.sort();
        let mut worst_combo: Option<(f64, (String, String), (String, String))> = None;
        for i in 0..sorted_candidates.len() {
            for j in (i + 1)..sorted_candidates.len() {
                let (first, second) = (&sorted_candidates[i], &sorted_candidates[j]);
                let loss = link_loss(&[first, second]);
                if worst_combo.as_ref().map_or(true, |(best, _, _)| loss > *best) {
                    worst_combo = Some((loss, first.clone(), second.clone()));
                }
            }
        }
        if let Some((_, first, second)) = worst_combo {
            scenarios.push(FailureScenario::MultiLink {
                links: vec![first, second],
            });
        }
    }

    log::debug!(
        "generated {} canonical scenarios for '{}'",
        scenarios.len(),
        topology.name
    );
    scenarios
}
