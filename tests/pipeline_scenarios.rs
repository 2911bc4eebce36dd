//! End-to-end pipeline scenarios: synthesis through validation and the
//! persistent learning loop, exercised against an in-memory history.

use netweave::analysis::RiskLevel;
use netweave::history::HistoryStore;
use netweave::intent::{DesignGoal, Intent, Pattern, RedundancyLevel};
use netweave::learning;
use netweave::orchestrator::{run_pipeline, PipelineOptions, StageStatus};
use netweave::simulation::{simulate, FailureScenario};

fn intent(name: &str, pattern: Pattern, sites: u32, redundancy: RedundancyLevel) -> Intent {
    let mut intent = Intent::named(name);
    intent.pattern = Some(pattern);
    intent.site_count = sites;
    intent.redundancy = redundancy;
    intent
}

fn options(seed: u64) -> PipelineOptions {
    PipelineOptions {
        seed: Some(seed),
        ..PipelineOptions::default()
    }
}

#[test]
fn full_mesh_critical_five_sites() {
    let store = HistoryStore::open_in_memory().unwrap();
    let mut spec = intent("dc-core", Pattern::FullMesh, 5, RedundancyLevel::Critical);
    spec.minimize_spof = true;
    spec.max_hops = 2;

    let report = run_pipeline(&store, &spec, &options(42));
    assert_eq!(report.overall_status, "success");

    let topology = report.topology.as_ref().unwrap();
    assert_eq!(topology.device_count(), 5);
    assert_eq!(topology.link_count(), 10);

    let analysis = report.analysis.as_ref().unwrap();
    assert_eq!(analysis.metrics.diameter, 1);
    assert!(analysis.single_points_of_failure.is_empty());

    let validation = report.validation.as_ref().unwrap();
    assert!(validation.satisfied);
    assert!(validation.overall_score >= 90.0);
}

#[test]
fn hub_spoke_keeps_its_intentional_spof() {
    let store = HistoryStore::open_in_memory().unwrap();
    let mut spec = intent("branches", Pattern::HubSpoke, 6, RedundancyLevel::Minimum);
    spec.minimize_spof = false;

    let report = run_pipeline(&store, &spec, &options(1));
    assert_eq!(report.overall_status, "success");

    let topology = report.topology.as_ref().unwrap();
    assert_eq!(topology.device_count(), 6);
    assert_eq!(topology.link_count(), 5);

    let analysis = report.analysis.as_ref().unwrap();
    assert_eq!(analysis.single_points_of_failure.len(), 1);
    let hub = &analysis.single_points_of_failure[0];
    assert_eq!(hub.risk, RiskLevel::Critical);
    assert!((hub.impact_pct - 83.3).abs() < 0.1);

    let validation = report.validation.as_ref().unwrap();
    assert!(!validation.satisfied);
    assert!(validation.violations.iter().any(|v| v.contains("SPOF")));
}

#[test]
fn ring_of_four_tolerates_any_link_failure() {
    let store = HistoryStore::open_in_memory().unwrap();
    let mut spec = intent("metro-ring", Pattern::Ring, 4, RedundancyLevel::Standard);
    spec.minimize_spof = false;

    let report = run_pipeline(&store, &spec, &options(7));
    assert_eq!(report.overall_status, "success");

    let topology = report.topology.as_ref().unwrap();
    assert_eq!(topology.device_count(), 4);
    assert_eq!(topology.link_count(), 4);

    for link in &topology.links {
        let result = simulate(
            topology,
            &FailureScenario::LinkDown {
                source: link.source_device.clone(),
                destination: link.destination_device.clone(),
                interfaces: Some((
                    link.source_interface.clone(),
                    link.destination_interface.clone(),
                )),
            },
        )
        .unwrap();
        assert!(!result.partitioned);
        assert_eq!(result.connectivity_loss_pct, 0.0);
    }

    let graph = topology.to_graph();
    assert_eq!(graph.edge_disjoint_paths("R1", "R3"), 2);
    assert_eq!(graph.edge_disjoint_paths("R2", "R4"), 2);
}

#[test]
fn leaf_spine_critical_ten_sites() {
    let store = HistoryStore::open_in_memory().unwrap();
    let mut spec = intent("fabric", Pattern::LeafSpine, 10, RedundancyLevel::Critical);
    spec.max_hops = 3;
    spec.minimize_spof = true;

    let report = run_pipeline(&store, &spec, &options(9));
    assert_eq!(report.overall_status, "success");

    let analysis = report.analysis.as_ref().unwrap();
    assert_eq!(analysis.metrics.diameter, 2);
    assert!(analysis.single_points_of_failure.is_empty());

    let validation = report.validation.as_ref().unwrap();
    assert!(validation.pattern_matched);
    assert!(validation.overall_score >= 90.0);
    assert!(validation.satisfied);
}

#[test]
fn tree_stays_lean_and_reports_aggregation_spof() {
    let store = HistoryStore::open_in_memory().unwrap();
    let mut spec = intent("campus", Pattern::Tree, 20, RedundancyLevel::Standard);
    spec.design_goal = DesignGoal::Cost;
    spec.minimize_spof = false;

    let report = run_pipeline(&store, &spec, &options(11));
    assert_eq!(report.overall_status, "success");

    let topology = report.topology.as_ref().unwrap();
    assert_eq!(topology.device_count(), 20);
    assert!(topology.link_count() <= 30, "links: {}", topology.link_count());

    let analysis = report.analysis.as_ref().unwrap();
    assert!(analysis
        .single_points_of_failure
        .iter()
        .any(|s| s.device_name.starts_with('A')));

    let validation = report.validation.as_ref().unwrap();
    assert!(validation
        .violations
        .iter()
        .any(|v| v.contains("flagged") && v.contains("SPOF")));
}

#[test]
fn learning_loop_recommends_and_overrides() {
    let store = HistoryStore::open_in_memory().unwrap();

    // 30 runs across three patterns under one (redundancy, design_goal)
    // key. Hub-spoke runs carry a one-hop ceiling and the ring runs a
    // two-hop ceiling, so both accumulate weak validation history while
    // full mesh accumulates strong history.
    for run in 0..10u64 {
        let spec = intent(
            &format!("learn-mesh-{}", run),
            Pattern::FullMesh,
            6,
            RedundancyLevel::Standard,
        );
        let report = run_pipeline(&store, &spec, &options(run));
        assert_eq!(report.overall_status, "success");
    }
    for run in 0..10u64 {
        let mut spec = intent(
            &format!("learn-hub-{}", run),
            Pattern::HubSpoke,
            6,
            RedundancyLevel::Standard,
        );
        spec.minimize_spof = false;
        spec.max_hops = 1;
        let report = run_pipeline(&store, &spec, &options(run));
        assert_eq!(report.overall_status, "success");
        assert!(!report.validation.as_ref().unwrap().satisfied);
    }
    for run in 0..10u64 {
        let mut spec = intent(
            &format!("learn-ring-{}", run),
            Pattern::Ring,
            6,
            RedundancyLevel::Standard,
        );
        spec.minimize_spof = false;
        spec.max_hops = 2; // ring of six has diameter 3
        let report = run_pipeline(&store, &spec, &options(run));
        assert_eq!(report.overall_status, "success");
        assert!(!report.validation.as_ref().unwrap().satisfied);
    }

    let (topologies, validations, simulations, _, _) = store.record_counts().unwrap();
    assert_eq!(topologies, 30);
    assert_eq!(validations, 30);
    assert_eq!(simulations, 90);

    // Recommendation: full mesh first, by a clear margin, with strong
    // confidence from ten samples.
    let ask = intent("learn-ask", Pattern::FullMesh, 6, RedundancyLevel::Standard);
    let recommendation = learning::recommend(&store, &ask, 6).unwrap();
    let top = &recommendation.ranked[0];
    assert_eq!(top.pattern, Pattern::FullMesh);
    assert!(top.confidence >= 80.0);
    assert!(top.based_on_history);
    let runner_up = recommendation
        .ranked
        .iter()
        .find(|s| s.pattern != Pattern::FullMesh && s.based_on_history)
        .unwrap();
    assert!(top.composite_score >= runner_up.composite_score + 10.0);

    // Autonomous optimizer: a caller insisting on hub-spoke gets
    // overridden toward the stronger pattern.
    let decision = learning::consider_override(&store, &ask, Pattern::HubSpoke)
        .unwrap()
        .expect("override expected");
    assert_eq!(decision.adjusted, Pattern::FullMesh);
    assert!(decision.expected_improvement > 0.0);

    let record = store
        .optimization_record(decision.record_id)
        .unwrap()
        .unwrap();
    assert_eq!(record.original_pattern, "hub_spoke");
    assert_eq!(record.adjusted_pattern, "full_mesh");
    assert!(record.expected_improvement > 0.0);
}

#[test]
fn optimizer_override_flows_through_the_pipeline() {
    let store = HistoryStore::open_in_memory().unwrap();
    for run in 0..10u64 {
        let spec = intent(
            &format!("flow-mesh-{}", run),
            Pattern::FullMesh,
            6,
            RedundancyLevel::Standard,
        );
        run_pipeline(&store, &spec, &options(run));
    }
    for run in 0..10u64 {
        let mut spec = intent(
            &format!("flow-hub-{}", run),
            Pattern::HubSpoke,
            6,
            RedundancyLevel::Standard,
        );
        spec.minimize_spof = false;
        spec.max_hops = 1;
        run_pipeline(&store, &spec, &options(run));
    }

    let mut spec = intent("flow-choice", Pattern::HubSpoke, 6, RedundancyLevel::Standard);
    spec.minimize_spof = false;
    let opts = PipelineOptions {
        seed: Some(99),
        consult_learning: true,
        ..PipelineOptions::default()
    };
    let report = run_pipeline(&store, &spec, &opts);

    assert_eq!(report.overall_status, "success");
    let decision = report.optimization.as_ref().expect("override applied");
    assert_eq!(decision.adjusted, Pattern::FullMesh);

    // the synthesized topology follows the override
    let topology = report.topology.as_ref().unwrap();
    assert_eq!(topology.link_count(), 15);

    // outcome back-filled once validation landed
    let record = store
        .optimization_record(decision.record_id)
        .unwrap()
        .unwrap();
    assert!(record.actual_improvement.is_some());
}

#[test]
fn five_hundred_sites_complete_within_stage_deadlines() {
    let store = HistoryStore::open_in_memory().unwrap();
    let mut spec = intent("scale", Pattern::LeafSpine, 500, RedundancyLevel::Standard);
    spec.minimize_spof = false;
    spec.max_hops = 4;

    let report = run_pipeline(&store, &spec, &options(21));
    assert_eq!(report.overall_status, "success", "stages: {:?}", report.stages);
    assert_eq!(report.topology.as_ref().unwrap().device_count(), 500);
    for stage in &report.stages {
        assert_eq!(stage.status, StageStatus::Success, "stage {}", stage.name);
    }
}

#[test]
fn simulating_a_ghost_device_fails_cleanly() {
    let store = HistoryStore::open_in_memory().unwrap();
    let spec = intent("ghost", Pattern::Ring, 5, RedundancyLevel::Standard);
    let report = run_pipeline(&store, &spec, &options(2));
    let topology = report.topology.as_ref().unwrap();

    let err = simulate(
        topology,
        &FailureScenario::NodeDown {
            device: "R50".into(),
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), "invalid_scenario");
}

#[test]
fn identical_seeds_reproduce_identical_artifacts() {
    let store_a = HistoryStore::open_in_memory().unwrap();
    let store_b = HistoryStore::open_in_memory().unwrap();
    let mut spec = intent("repro", Pattern::Hybrid, 24, RedundancyLevel::Standard);
    spec.minimize_spof = false;

    let a = run_pipeline(&store_a, &spec, &options(1234));
    let b = run_pipeline(&store_b, &spec, &options(1234));

    assert_eq!(a.topology, b.topology);
    assert_eq!(
        serde_json::to_string(&a.validation).unwrap(),
        serde_json::to_string(&b.validation).unwrap()
    );
}
