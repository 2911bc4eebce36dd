//! Intent validation.
//!
//! Scores a synthesized topology against the parsed intent constraints,
//! combining structural checks (pattern shape, diameter, SPOF count) with
//! graph-measured redundancy and the resilience observed in the canonical
//! failure simulations. The numeric weights are a contract; regression
//! suites and the learning aggregates depend on them.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::error::CoreError;
use crate::graph::{stable_seed, Graph};
use crate::intent::{parse_intent, Intent, Pattern};
use crate::simulation::SimulationResult;
use crate::topology::Topology;

/// Weight of the redundancy component in the overall score.
const WEIGHT_REDUNDANCY: f64 = 0.40;
/// Weight of the path-diversity component.
const WEIGHT_PATH_DIVERSITY: f64 = 0.35;
/// Weight of the simulation-resilience component.
const WEIGHT_RESILIENCE: f64 = 0.25;

const PENALTY_MAX_HOPS: f64 = 20.0;
const PENALTY_SPOF: f64 = 30.0;
const PENALTY_PATTERN: f64 = 15.0;

/// Score floor for an intent to count as satisfied.
const SATISFACTION_THRESHOLD: f64 = 70.0;

/// Resilience component used when no simulations are supplied.
const NEUTRAL_RESILIENCE: f64 = 50.0;

/// Deterministic validation verdict. Identical inputs serialize to
/// byte-identical records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub satisfied: bool,
    pub overall_score: f64,
    pub redundancy_score: f64,
    pub path_diversity_score: f64,
    pub max_hops_ok: bool,
    pub actual_diameter: u32,
    pub spof_eliminated: bool,
    pub spof_count: usize,
    pub pattern_matched: bool,
    /// Ordered textual descriptions: hard violations first, then flags.
    pub violations: Vec<String>,
}

/// Validate a topology against its intent, using the analysis and the
/// canonical simulation results for the resilience component.
pub fn validate(
    topology: &Topology,
    intent: &Intent,
    analysis: &AnalysisResult,
    simulations: &[SimulationResult],
) -> Result<ValidationResult, CoreError> {
    let constraints = parse_intent(intent)?;
    let graph = topology.to_graph();
    let pairs = graph.sample_pairs(stable_seed(&topology.name));
    let target = constraints.effective_target;

    let counts: Vec<u32> = pairs
        .iter()
        .map(|(a, b)| graph.edge_disjoint_paths(a, b))
        .collect();
    let observed_min = counts.iter().copied().min().unwrap_or(0);

    let redundancy_score = round1((100.0 * f64::from(observed_min) / f64::from(target)).min(100.0));
    let path_diversity_score = if counts.is_empty() {
        0.0
    } else {
        let meeting = counts.iter().filter(|c| **c >= target).count();
        round1(100.0 * meeting as f64 / counts.len() as f64)
    };

    let actual_diameter = analysis.metrics.diameter;
    let max_hops_ok = actual_diameter <= constraints.max_hops;

    let spof_count = analysis.single_points_of_failure.len();
    let spof_eliminated = spof_count == 0;

    let pattern_matched = constraints
        .pattern
        .map_or(true, |p| pattern_matches(&graph, p));

    let resilience = if simulations.is_empty() {
        NEUTRAL_RESILIENCE
    } else {
        let avg_loss: f64 = simulations
            .iter()
            .map(|s| s.connectivity_loss_pct)
            .sum::<f64>()
            / simulations.len() as f64;
        100.0 - avg_loss
    };

    let mut overall = WEIGHT_REDUNDANCY * redundancy_score
        + WEIGHT_PATH_DIVERSITY * path_diversity_score
        + WEIGHT_RESILIENCE * resilience;
    if !max_hops_ok {
        overall -= PENALTY_MAX_HOPS;
    }
    if constraints.require_spof_free && !spof_eliminated {
        overall -= PENALTY_SPOF;
    }
    if !pattern_matched {
        overall -= PENALTY_PATTERN;
    }
    let overall_score = round1(overall.clamp(0.0, 100.0));

    let mut violations = Vec::new();
    if redundancy_score < 70.0 {
        violations.push(format!(
            "redundancy below target: minimum {} edge-disjoint paths observed, {} required",
            observed_min, target
        ));
    }
    if path_diversity_score < 60.0 {
        violations.push(format!(
            "path diversity insufficient: only {:.1}% of device pairs reach {} edge-disjoint paths",
            path_diversity_score, target
        ));
    }
    if !max_hops_ok {
        violations.push(format!(
            "diameter {} exceeds max_hops {}; increase max_hops or add direct links",
            actual_diameter, constraints.max_hops
        ));
    }
    if !spof_eliminated {
        if constraints.require_spof_free {
            violations.push(format!(
                "{} single point(s) of failure remain despite minimize_spof",
                spof_count
            ));
        } else {
            // Flagged for visibility, but not a hard violation: the intent
            // tolerates the SPOF.
            for spof in &analysis.single_points_of_failure {
                violations.push(format!(
                    "flagged: {} severity SPOF at {} ({:.1}% impact)",
                    spof.risk.as_str(),
                    spof.device_name,
                    spof.impact_pct
                ));
            }
        }
    }
    if !pattern_matched {
        violations.push(format!(
            "topology does not match the requested {} pattern",
            constraints
                .pattern
                .map(|p| p.as_str())
                .unwrap_or("requested")
        ));
    }

    let satisfied = overall_score >= SATISFACTION_THRESHOLD
        && max_hops_ok
        && (!constraints.require_spof_free || spof_eliminated)
        && pattern_matched;

    log::info!(
        "validated '{}': score {:.1}, satisfied {}, {} violation entries",
        topology.name,
        overall_score,
        satisfied,
        violations.len()
    );

    Ok(ValidationResult {
        satisfied,
        overall_score,
        redundancy_score,
        path_diversity_score,
        max_hops_ok,
        actual_diameter,
        spof_eliminated,
        spof_count,
        pattern_matched,
        violations,
    })
}

/// Structural pattern check. Two-site topologies collapse every pattern to
/// a single link, which counts as matching.
fn pattern_matches(graph: &Graph, pattern: Pattern) -> bool {
    let nodes = graph.node_names();
    let n = nodes.len();
    if n <= 2 {
        return graph.is_connected();
    }

    let adjacency: HashMap<&str, HashSet<&str>> = nodes
        .iter()
        .map(|name| (*name, graph.neighbors(name).into_iter().collect()))
        .collect();

    match pattern {
        Pattern::FullMesh => nodes.iter().all(|a| {
            adjacency
                .get(a)
                .map_or(false, |peers| peers.len() == n - 1)
        }),
        Pattern::HubSpoke => {
            let hubs: Vec<&str> = nodes
                .iter()
                .copied()
                .filter(|name| adjacency.get(name).map_or(false, |p| p.len() == n - 1))
                .collect();
            if hubs.is_empty() || hubs.len() > 2 {
                return false;
            }
            let hub_set: HashSet<&str> = hubs.iter().copied().collect();
            nodes.iter().all(|name| {
                hub_set.contains(name)
                    || adjacency
                        .get(name)
                        .map_or(false, |peers| peers.is_subset(&hub_set))
            })
        }
        Pattern::Ring => {
            graph.is_connected()
                && nodes.iter().all(|name| graph.degree(name) >= 2)
                && graph.edge_count() <= 2 * n
        }
        Pattern::Tree => graph.is_connected() && graph.edge_count() < 2 * n,
        Pattern::LeafSpine => leaf_spine_shape(graph, &adjacency),
        Pattern::Hybrid => graph.is_connected(),
    }
}

/// Leaf-spine check: bipartite, with every cross pair adjacent.
fn leaf_spine_shape(graph: &Graph, adjacency: &HashMap<&str, HashSet<&str>>) -> bool {
    let nodes = graph.node_names();
    if !graph.is_connected() {
        return false;
    }

    let mut color: HashMap<&str, bool> = HashMap::new();
    let mut queue = VecDeque::from([nodes[0]]);
    color.insert(nodes[0], false);
    while let Some(node) = queue.pop_front() {
        let side = color[node];
        let Some(peers) = adjacency.get(node) else {
            return false;
        };
        for &peer in peers {
            match color.get(peer) {
                Some(&c) if c == side => return false, // odd cycle
                Some(_) => {}
                None => {
                    color.insert(peer, !side);
                    queue.push_back(peer);
                }
            }
        }
    }

    let part_a: Vec<&str> = nodes.iter().copied().filter(|nm| !color[nm]).collect();
    let part_b: Vec<&str> = nodes.iter().copied().filter(|nm| color[nm]).collect();
    part_a.iter().all(|a| {
        part_b
            .iter()
            .all(|b| adjacency.get(a).map_or(false, |peers| peers.contains(b)))
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
