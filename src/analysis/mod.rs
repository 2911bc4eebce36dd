//! Read-only topology analysis.
//!
//! Detects structural weaknesses and computes graph metrics:
//! - single points of failure (articulation points) with impact tiers
//! - unbalanced routing paths across edge-disjoint alternatives
//! - overloaded nodes (link concentration)
//! - diameter, density, redundancy factor, health score
//!
//! Analysis is a pure function of the topology; the same input always
//! produces the same result.

use serde::Serialize;

use crate::graph::{stable_seed, Graph};
use crate::topology::Topology;

/// Risk tier for a finding, ordered worst-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskLevel {
    /// Health-score deduction for one finding of this tier.
    pub fn deduction(&self) -> f64 {
        match self {
            RiskLevel::Critical => 30.0,
            RiskLevel::High => 20.0,
            RiskLevel::Medium => 10.0,
            RiskLevel::Low => 5.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "critical",
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
        }
    }

    /// Tier for an impact percentage (share of devices cut off).
    pub fn from_impact_pct(pct: f64) -> RiskLevel {
        if pct > 50.0 {
            RiskLevel::Critical
        } else if pct >= 25.0 {
            RiskLevel::High
        } else if pct >= 10.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// A device whose failure partitions the network.
#[derive(Debug, Clone, Serialize)]
pub struct SinglePointOfFailure {
    pub device_name: String,
    pub risk: RiskLevel,
    /// Share of all devices (the failed one included) cut off from the
    /// largest surviving island.
    pub impact_pct: f64,
    /// Surviving devices stranded outside the largest island, sorted.
    pub dependent_devices: Vec<String>,
    pub remedy: String,
}

/// A device pair whose alternative paths differ too much in length.
#[derive(Debug, Clone, Serialize)]
pub struct UnbalancedPath {
    pub source_device: String,
    pub destination_device: String,
    pub min_hops: u32,
    pub max_hops: u32,
    /// min/max hop ratio across up to three edge-disjoint paths.
    pub balance: f64,
    pub severity: RiskLevel,
}

/// A device carrying disproportionately many links.
#[derive(Debug, Clone, Serialize)]
pub struct OverloadedNode {
    pub device_name: String,
    pub degree: usize,
    pub avg_degree: f64,
    pub recommendation: String,
}

/// Aggregate graph metrics.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyMetrics {
    pub device_count: usize,
    pub link_count: usize,
    /// Maximum shortest-path hop count.
    pub diameter: u32,
    /// Graph density 2|E|/(|V|(|V|-1)).
    pub connectivity_coefficient: f64,
    /// Mean edge-disjoint-path count across sampled pairs.
    pub redundancy_factor: f64,
    pub spof_count: usize,
}

/// Complete analysis of one topology.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub topology_name: String,
    pub metrics: TopologyMetrics,
    pub single_points_of_failure: Vec<SinglePointOfFailure>,
    pub unbalanced_paths: Vec<UnbalancedPath>,
    pub overloaded_nodes: Vec<OverloadedNode>,
    /// 0-100; the scoring formula is a contract, see `health_score`.
    pub health_score: f64,
    pub health_status: String,
    pub summary: String,
}

/// Analyze a topology. Never fails for well-formed input; a topology with
/// fewer than two devices scores a clean 100.
pub fn analyze(topology: &Topology) -> AnalysisResult {
    let graph = topology.to_graph();
    let seed = stable_seed(&topology.name);

    if topology.device_count() < 2 {
        return trivial_result(topology);
    }

    log::debug!(
        "analyzing '{}': {} devices, {} links",
        topology.name,
        topology.device_count(),
        topology.link_count()
    );

    let spofs = detect_spofs(&graph);
    let pairs = graph.sample_pairs(seed);
    let unbalanced = detect_unbalanced_paths(&graph, &pairs);
    let overloaded = detect_overloaded_nodes(&graph);

    let redundancy_factor = if pairs.is_empty() {
        0.0
    } else {
        let total: u32 = pairs
            .iter()
            .map(|(a, b)| graph.edge_disjoint_paths(a, b))
            .sum();
        round2(f64::from(total) / pairs.len() as f64)
    };

    let metrics = TopologyMetrics {
        device_count: graph.node_count(),
        link_count: graph.edge_count(),
        diameter: graph.diameter(seed),
        connectivity_coefficient: round3(graph.connectivity_coefficient()),
        redundancy_factor,
        spof_count: spofs.len(),
    };

    let health_score = health_score(&metrics, &spofs, &unbalanced);
    let health_status = health_status(health_score);
    let summary = summarize(topology, &metrics, &spofs, &unbalanced, health_score);

    log::info!(
        "analysis of '{}': health {:.1}/100, {} SPOFs, {} unbalanced pairs",
        topology.name,
        health_score,
        spofs.len(),
        unbalanced.len()
    );

    AnalysisResult {
        topology_name: topology.name.clone(),
        metrics,
        single_points_of_failure: spofs,
        unbalanced_paths: unbalanced,
        overloaded_nodes: overloaded,
        health_score,
        health_status,
        summary,
    }
}

fn trivial_result(topology: &Topology) -> AnalysisResult {
    AnalysisResult {
        topology_name: topology.name.clone(),
        metrics: TopologyMetrics {
            device_count: topology.device_count(),
            link_count: topology.link_count(),
            diameter: 0,
            connectivity_coefficient: 0.0,
            redundancy_factor: 0.0,
            spof_count: 0,
        },
        single_points_of_failure: Vec::new(),
        unbalanced_paths: Vec::new(),
        overloaded_nodes: Vec::new(),
        health_score: 100.0,
        health_status: "excellent".into(),
        summary: format!(
            "Topology '{}' is below analysis size; health 100/100.",
            topology.name
        ),
    }
}

fn detect_spofs(graph: &Graph) -> Vec<SinglePointOfFailure> {
    let total = graph.node_count();
    let mut spofs = Vec::new();

    for point in graph.articulation_points() {
        let mut probe = graph.clone();
        probe.remove_node(&point);
        let components = probe.connected_components();
        let largest = components.iter().map(|c| c.len()).max().unwrap_or(0);

        let mut dependent: Vec<String> = components
            .iter()
            .filter(|c| c.len() != largest)
            .flatten()
            .cloned()
            .collect();
        // Several equally-large islands: everything outside the first is
        // stranded relative to it.
        if components.len() > 1 && dependent.is_empty() {
            dependent = components.iter().skip(1).flatten().cloned().collect();
        }
        dependent.sort();

        let impact_pct = round1((total - largest) as f64 / total as f64 * 100.0);
        let risk = RiskLevel::from_impact_pct(impact_pct);
        let degree = graph.degree(&point);
        let preview: Vec<&str> = dependent.iter().take(3).map(|s| s.as_str()).collect();
        let remedy = format!(
            "Add redundant links around {} (currently {} links); candidate peers: {}",
            point,
            degree,
            preview.join(", ")
        );

        spofs.push(SinglePointOfFailure {
            device_name: point,
            risk,
            impact_pct,
            dependent_devices: dependent,
            remedy,
        });
    }
    spofs
}

/// Hop counts of up to three successively edge-disjoint shortest paths.
fn disjoint_path_hops(graph: &Graph, a: &str, b: &str) -> Vec<u32> {
    let mut probe = graph.clone();
    let mut hops = Vec::new();
    for _ in 0..3 {
        let Some(path) = probe.shortest_path(a, b) else {
            break;
        };
        hops.push((path.len() - 1) as u32);
        for pair in path.windows(2) {
            probe.remove_edge_between(&pair[0], &pair[1]);
        }
    }
    hops
}

fn detect_unbalanced_paths(graph: &Graph, pairs: &[(String, String)]) -> Vec<UnbalancedPath> {
    let mut unbalanced = Vec::new();
    for (a, b) in pairs {
        let hops = disjoint_path_hops(graph, a, b);
        if hops.len() < 2 {
            continue;
        }
        let min = *hops.iter().min().expect("non-empty hops");
        let max = *hops.iter().max().expect("non-empty hops");
        if max == 0 {
            continue;
        }
        let balance = round3(f64::from(min) / f64::from(max));
        if balance < 0.5 {
            let severity = if balance < 0.25 {
                RiskLevel::Medium
            } else {
                RiskLevel::Low
            };
            unbalanced.push(UnbalancedPath {
                source_device: a.clone(),
                destination_device: b.clone(),
                min_hops: min,
                max_hops: max,
                balance,
                severity,
            });
        }
    }
    unbalanced
}

fn detect_overloaded_nodes(graph: &Graph) -> Vec<OverloadedNode> {
    let nodes = graph.node_names();
    if nodes.is_empty() {
        return Vec::new();
    }
    let avg = nodes.iter().map(|n| graph.degree(n)).sum::<usize>() as f64 / nodes.len() as f64;
    let mut overloaded = Vec::new();
    for node in nodes {
        let degree = graph.degree(node);
        if avg > 0.0 && degree as f64 > 1.5 * avg {
            overloaded.push(OverloadedNode {
                device_name: node.to_string(),
                degree,
                avg_degree: round2(avg),
                recommendation: format!(
                    "{} carries {} links against a mean of {:.1}; spread load over an additional aggregation point",
                    node, degree, avg
                ),
            });
        }
    }
    overloaded
}

/// Contract scoring: start at 100, subtract 30/20/10/5 per
/// critical/high/medium/low SPOF or unbalanced-path issue, add 10 for
/// density >= 0.6 and 10 for redundancy factor >= 2.0, clamp to [0, 100].
fn health_score(
    metrics: &TopologyMetrics,
    spofs: &[SinglePointOfFailure],
    unbalanced: &[UnbalancedPath],
) -> f64 {
    let mut score = 100.0;
    for spof in spofs {
        score -= spof.risk.deduction();
    }
    for path in unbalanced {
        score -= path.severity.deduction();
    }
    if metrics.connectivity_coefficient >= 0.6 {
        score += 10.0;
    }
    if metrics.redundancy_factor >= 2.0 {
        score += 10.0;
    }
    round1(score.clamp(0.0, 100.0))
}

fn health_status(score: f64) -> String {
    if score >= 80.0 {
        "excellent"
    } else if score >= 60.0 {
        "good"
    } else if score >= 40.0 {
        "fair"
    } else {
        "poor"
    }
    .to_string()
}

fn summarize(
    topology: &Topology,
    metrics: &TopologyMetrics,
    spofs: &[SinglePointOfFailure],
    unbalanced: &[UnbalancedPath],
    score: f64,
) -> String {
    let worst = spofs
        .iter()
        .map(|s| (s.risk, format!("{} SPOF at {}", s.risk.as_str(), s.device_name)))
        .chain(unbalanced.iter().map(|u| {
            (
                u.severity,
                format!(
                    "unbalanced paths {}-{} (balance {:.2})",
                    u.source_device, u.destination_device, u.balance
                ),
            )
        }))
        .min_by_key(|(risk, _)| *risk)
        .map(|(_, text)| text)
        .unwrap_or_else(|| "no structural issues".to_string());

    format!(
        "Topology '{}': health {:.1}/100; {} devices, {} links, diameter {}; worst issue: {}.",
        topology.name, score, metrics.device_count, metrics.link_count, metrics.diameter, worst
    )
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Intent, Pattern, RedundancyLevel};
    use crate::topology::synthesizer::Synthesizer;

    fn synth(pattern: Pattern, sites: u32, redundancy: RedundancyLevel) -> Topology {
        let mut intent = Intent::named("analysis");
        intent.pattern = Some(pattern);
        intent.site_count = sites;
        intent.redundancy = redundancy;
        intent.minimize_spof = false;
        intent.min_connections_per_site = 1;
        Synthesizer::new(Some(42)).synthesize(&intent).unwrap()
    }

    #[test]
    fn full_mesh_scores_clean() {
        let result = analyze(&synth(Pattern::FullMesh, 5, RedundancyLevel::Critical));
        assert!(result.single_points_of_failure.is_empty());
        assert!(result.unbalanced_paths.is_empty());
        assert_eq!(result.metrics.diameter, 1);
        assert_eq!(result.health_score, 100.0);
        assert_eq!(result.health_status, "excellent");
    }

    #[test]
    fn hub_spoke_reports_critical_hub() {
        let result = analyze(&synth(Pattern::HubSpoke, 6, RedundancyLevel::Minimum));
        assert_eq!(result.single_points_of_failure.len(), 1);
        let spof = &result.single_points_of_failure[0];
        assert_eq!(spof.device_name, "R1");
        assert_eq!(spof.risk, RiskLevel::Critical);
        assert!((spof.impact_pct - 83.3).abs() < 0.1);
        // 100 - 30, no bonuses at this density
        assert_eq!(result.health_score, 70.0);
        assert!(result.summary.contains("R1"));
    }

    #[test]
    fn ring_earns_density_and_redundancy_bonuses() {
        let result = analyze(&synth(Pattern::Ring, 4, RedundancyLevel::Standard));
        assert!(result.single_points_of_failure.is_empty());
        assert_eq!(result.metrics.redundancy_factor, 2.0);
        assert!(result.metrics.connectivity_coefficient >= 0.6);
        assert_eq!(result.health_score, 100.0);
    }

    #[test]
    fn unbalanced_detour_is_flagged() {
        use crate::topology::{Device, Link, Topology};
        use std::net::Ipv4Addr;

        // A-B direct, plus A-C-D-E-B detour: balance 1/4
        let names = ["A", "B", "C", "D", "E"];
        let devices: Vec<Device> = names
            .iter()
            .enumerate()
            .map(|(i, n)| Device::router(n, crate::ip::router_id(i as u32), 65000 + i as u32))
            .collect();
        let pairs = [("A", "B"), ("A", "C"), ("C", "D"), ("D", "E"), ("E", "B")];
        let links: Vec<Link> = pairs
            .iter()
            .enumerate()
            .map(|(i, (a, b))| {
                let base = u32::from(Ipv4Addr::new(10, 100, 0, 0)) + i as u32 * 4;
                Link {
                    source_device: a.to_string(),
                    source_interface: format!("eth{}", i),
                    source_ip: Ipv4Addr::from(base + 1),
                    destination_device: b.to_string(),
                    destination_interface: format!("eth1{}", i),
                    destination_ip: Ipv4Addr::from(base + 2),
                    subnet_mask: crate::ip::LINK_MASK,
                    cost: 100,
                }
            })
            .collect();
        let topo = Topology {
            name: "detour".into(),
            devices,
            links,
            routing_protocol: "ospf".into(),
        };
        topo.validate().unwrap();

        let result = analyze(&topo);
        let finding = result
            .unbalanced_paths
            .iter()
            .find(|u| u.source_device == "A" && u.destination_device == "B")
            .expect("A-B imbalance reported");
        assert_eq!(finding.min_hops, 1);
        assert_eq!(finding.max_hops, 4);
        assert!(finding.balance < 0.5);
    }

    #[test]
    fn hub_is_overloaded_in_star() {
        let result = analyze(&synth(Pattern::HubSpoke, 8, RedundancyLevel::Minimum));
        assert_eq!(result.overloaded_nodes.len(), 1);
        assert_eq!(result.overloaded_nodes[0].device_name, "R1");
        assert_eq!(result.overloaded_nodes[0].degree, 7);
    }

    #[test]
    fn single_device_is_trivially_healthy() {
        use crate::topology::{Device, Topology};
        let topo = Topology {
            name: "lonely".into(),
            devices: vec![Device::switch("SW1")],
            links: vec![],
            routing_protocol: "ospf".into(),
        };
        let result = analyze(&topo);
        assert_eq!(result.health_score, 100.0);
        assert!(result.single_points_of_failure.is_empty());
    }

    #[test]
    fn repeated_analysis_is_identical() {
        let topo = synth(Pattern::Tree, 20, RedundancyLevel::Standard);
        let a = serde_json::to_string(&analyze(&topo)).unwrap();
        let b = serde_json::to_string(&analyze(&topo)).unwrap();
        assert_eq!(a, b);
    }
}
