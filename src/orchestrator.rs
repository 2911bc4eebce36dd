//! Pipeline orchestration.
//!
//! `run_pipeline` composes parsing, learning advice, synthesis, analysis,
//! simulation, validation, and persistence into one invocation. Only a
//! synthesis failure is fatal; later stages degrade the run to
//! `partial_success`. Cancellation is cooperative and honored at stage
//! boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::analysis::{analyze, AnalysisResult};
use crate::error::CoreError;
use crate::history::HistoryStore;
use crate::intent::{parse_intent, Intent};
use crate::learning::{self, OptimizationDecision};
use crate::simulation::{generate_test_scenarios, simulate, SimulationResult};
use crate::topology::synthesizer::Synthesizer;
use crate::topology::Topology;
use crate::validation::{validate, ValidationResult};

/// Cooperative cancellation flag, checked between stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-stage deadlines in milliseconds. Stages are CPU-bound and do not
/// suspend, so the deadline is asserted against the measured duration.
#[derive(Debug, Clone)]
pub struct StageDeadlines {
    pub synthesis_ms: u64,
    pub analysis_ms: u64,
    pub simulation_ms: u64,
    pub validation_ms: u64,
}

impl Default for StageDeadlines {
    fn default() -> StageDeadlines {
        StageDeadlines {
            synthesis_ms: 30_000,
            analysis_ms: 10_000,
            simulation_ms: 10_000,
            validation_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Reproducibility seed for synthesis.
    pub seed: Option<u64>,
    /// Consult the learning subsystem before synthesis (recommendation
    /// for pattern-less intents, autonomous override otherwise).
    pub consult_learning: bool,
    pub deadlines: StageDeadlines,
    pub cancel: Option<CancelToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Success,
    Failed,
    Skipped,
    Cancelled,
}

/// Status entry for one pipeline stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: &'static str,
    pub status: StageStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary counters for quick consumption by transports and logs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub device_count: usize,
    pub link_count: usize,
    pub health_score: f64,
    pub overall_score: f64,
    pub satisfied: bool,
    pub stages_completed: usize,
    pub stages_failed: usize,
}

/// Complete result of one pipeline invocation.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub pipeline_id: String,
    pub overall_status: String,
    pub stages: Vec<StageReport>,
    pub summary: PipelineSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<Topology>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisResult>,
    pub simulations: Vec<SimulationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization: Option<OptimizationDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology_id: Option<i64>,
    /// False when any history write failed; the learning loop compensates
    /// on its next read.
    pub persistence_complete: bool,
}

struct StageClock {
    started: Instant,
}

impl StageClock {
    fn start() -> StageClock {
        StageClock {
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

fn stage_success(name: &'static str, duration_ms: u64) -> StageReport {
    StageReport {
        name,
        status: StageStatus::Success,
        duration_ms,
        error_kind: None,
        error: None,
    }
}

fn stage_failed(name: &'static str, duration_ms: u64, err: &CoreError) -> StageReport {
    StageReport {
        name,
        status: StageStatus::Failed,
        duration_ms,
        error_kind: Some(err.kind().to_string()),
        error: Some(err.to_string()),
    }
}

fn stage_cancelled(name: &'static str) -> StageReport {
    let err = CoreError::Cancelled {
        stage: name.to_string(),
    };
    StageReport {
        name,
        status: StageStatus::Cancelled,
        duration_ms: 0,
        error_kind: Some(err.kind().to_string()),
        error: Some(err.to_string()),
    }
}

/// Check a finished stage against its deadline, downgrading a success to
/// `StageTimeout` when exceeded.
fn enforce_deadline(report: StageReport, deadline_ms: u64) -> StageReport {
    if report.status == StageStatus::Success && report.duration_ms > deadline_ms {
        let err = CoreError::StageTimeout {
            stage: report.name.to_string(),
            deadline_ms,
        };
        log::warn!("{}", err);
        return stage_failed(report.name, report.duration_ms, &err);
    }
    report
}

/// Run the full design-and-evaluate pipeline for one intent.
pub fn run_pipeline(
    store: &HistoryStore,
    intent: &Intent,
    options: &PipelineOptions,
) -> PipelineReport {
    let pipeline_id = format!("pipe_{:012x}", rand::random::<u64>() & 0xffff_ffff_ffff);
    log::info!("[{}] pipeline start for intent '{}'", pipeline_id, intent.name);

    let mut stages: Vec<StageReport> = Vec::new();
    let mut report = PipelineReport {
        pipeline_id: pipeline_id.clone(),
        overall_status: "success".into(),
        stages: Vec::new(),
        summary: PipelineSummary::default(),
        topology: None,
        analysis: None,
        simulations: Vec::new(),
        validation: None,
        optimization: None,
        topology_id: None,
        persistence_complete: true,
    };

    let cancelled = |stages: &mut Vec<StageReport>, name: &'static str| -> bool {
        let hit = options
            .cancel
            .as_ref()
            .map_or(false, CancelToken::is_cancelled);
        if hit {
            stages.push(stage_cancelled(name));
        }
        hit
    };

    // Stage 1: parse intent.
    if cancelled(&mut stages, "parse") {
        return finish(report, stages, "cancelled");
    }
    let clock = StageClock::start();
    match parse_intent(intent) {
        Ok(_) => stages.push(stage_success("parse", clock.elapsed_ms())),
        Err(err) => {
            stages.push(stage_failed("parse", clock.elapsed_ms(), &err));
            return finish(report, stages, "failed");
        }
    }

    // Stage 2 (optional): learning advice.
    let mut effective_intent = intent.clone();
    if options.consult_learning {
        if cancelled(&mut stages, "advise") {
            return finish(report, stages, "cancelled");
        }
        let clock = StageClock::start();
        let advice = advise(store, &mut effective_intent);
        match advice {
            Ok(decision) => {
                report.optimization = decision;
                stages.push(stage_success("advise", clock.elapsed_ms()));
            }
            Err(err) => {
                log::warn!("[{}] advice stage failed: {}", pipeline_id, err);
                stages.push(stage_failed("advise", clock.elapsed_ms(), &err));
            }
        }
    }

    // Stage 3: synthesis. Failure is fatal.
    if cancelled(&mut stages, "synthesize") {
        return finish(report, stages, "cancelled");
    }
    let clock = StageClock::start();
    let topology = match Synthesizer::new(options.seed).synthesize(&effective_intent) {
        Ok(topology) => {
            stages.push(enforce_deadline(
                stage_success("synthesize", clock.elapsed_ms()),
                options.deadlines.synthesis_ms,
            ));
            if stages.last().map(|s| s.status) != Some(StageStatus::Success) {
                return finish(report, stages, "failed");
            }
            topology
        }
        Err(err) => {
            stages.push(stage_failed("synthesize", clock.elapsed_ms(), &err));
            return finish(report, stages, "failed");
        }
    };
    report.summary.device_count = topology.device_count();
    report.summary.link_count = topology.link_count();

    // Stage 4: analysis.
    if cancelled(&mut stages, "analyze") {
        report.topology = Some(topology);
        return finish(report, stages, "cancelled");
    }
    let clock = StageClock::start();
    let analysis = analyze(&topology);
    stages.push(enforce_deadline(
        stage_success("analyze", clock.elapsed_ms()),
        options.deadlines.analysis_ms,
    ));
    report.summary.health_score = analysis.health_score;

    // Stage 5: canonical failure simulations.
    if cancelled(&mut stages, "simulate") {
        report.topology = Some(topology);
        report.analysis = Some(analysis);
        return finish(report, stages, "cancelled");
    }
    let clock = StageClock::start();
    let mut simulations = Vec::new();
    let mut simulation_error: Option<CoreError> = None;
    for scenario in generate_test_scenarios(&topology) {
        match simulate(&topology, &scenario) {
            Ok(result) => simulations.push(result),
            Err(err) => {
                simulation_error = Some(err);
                break;
            }
        }
    }
    match simulation_error {
        None => stages.push(enforce_deadline(
            stage_success("simulate", clock.elapsed_ms()),
            options.deadlines.simulation_ms,
        )),
        Some(err) => stages.push(stage_failed("simulate", clock.elapsed_ms(), &err)),
    }

    // Stage 6: validation.
    if cancelled(&mut stages, "validate") {
        report.topology = Some(topology);
        report.analysis = Some(analysis);
        report.simulations = simulations;
        return finish(report, stages, "cancelled");
    }
    let clock = StageClock::start();
    let mut validation_duration_ms = 0.0;
    let validation = match validate(&topology, &effective_intent, &analysis, &simulations) {
        Ok(result) => {
            validation_duration_ms = clock.elapsed_ms() as f64;
            stages.push(enforce_deadline(
                stage_success("validate", clock.elapsed_ms()),
                options.deadlines.validation_ms,
            ));
            report.summary.overall_score = result.overall_score;
            report.summary.satisfied = result.satisfied;
            Some(result)
        }
        Err(err) => {
            stages.push(stage_failed("validate", clock.elapsed_ms(), &err));
            None
        }
    };

    // Stage 7: persistence. The topology record lands before anything
    // that references it.
    if cancelled(&mut stages, "persist") {
        report.topology = Some(topology);
        report.analysis = Some(analysis);
        report.simulations = simulations;
        report.validation = validation;
        return finish(report, stages, "cancelled");
    }
    let clock = StageClock::start();
    let persisted = persist(
        store,
        &effective_intent,
        &topology,
        &analysis,
        &simulations,
        validation.as_ref(),
        validation_duration_ms,
        report.optimization.as_ref(),
    );
    match persisted {
        Ok(topology_id) => {
            report.topology_id = Some(topology_id);
            stages.push(stage_success("persist", clock.elapsed_ms()));
        }
        Err(err) => {
            log::error!("[{}] persistence failed: {}", pipeline_id, err);
            report.persistence_complete = false;
            stages.push(stage_failed("persist", clock.elapsed_ms(), &err));
        }
    }

    report.topology = Some(topology);
    report.analysis = Some(analysis);
    report.simulations = simulations;
    report.validation = validation;

    let status = if stages.iter().any(|s| s.status == StageStatus::Failed) {
        "partial_success"
    } else {
        "success"
    };
    finish(report, stages, status)
}

/// Pick or override the pattern from history. Mutates the effective
/// intent in place and returns the override decision, if any.
fn advise(
    store: &HistoryStore,
    intent: &mut Intent,
) -> Result<Option<OptimizationDecision>, CoreError> {
    match intent.pattern {
        None => {
            let recommendation = learning::recommend(store, intent, 3)?;
            if let Some(top) = recommendation.ranked.first() {
                log::info!(
                    "recommendation selected pattern {} for '{}'",
                    top.pattern.as_str(),
                    intent.name
                );
                intent.pattern = Some(top.pattern);
            }
            Ok(None)
        }
        Some(chosen) => {
            let decision = learning::consider_override(store, intent, chosen)?;
            if let Some(ref d) = decision {
                intent.pattern = Some(d.adjusted);
            }
            Ok(decision)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn persist(
    store: &HistoryStore,
    intent: &Intent,
    topology: &Topology,
    analysis: &AnalysisResult,
    simulations: &[SimulationResult],
    validation: Option<&ValidationResult>,
    validation_duration_ms: f64,
    optimization: Option<&OptimizationDecision>,
) -> Result<i64, CoreError> {
    let topology_id = store.record_topology(intent, topology, analysis)?;
    for sim in simulations {
        store.record_simulation(topology_id, sim)?;
    }
    if let Some(validation) = validation {
        store.record_validation(topology_id, validation, validation_duration_ms)?;
        if let Some(decision) = optimization {
            learning::record_override_outcome(store, decision, intent, validation.overall_score)?;
        }
    }
    Ok(topology_id)
}

fn finish(
    mut report: PipelineReport,
    stages: Vec<StageReport>,
    status: &str,
) -> PipelineReport {
    report.summary.stages_completed = stages
        .iter()
        .filter(|s| s.status == StageStatus::Success)
        .count();
    report.summary.stages_failed = stages
        .iter()
        .filter(|s| s.status == StageStatus::Failed)
        .count();
    report.stages = stages;
    report.overall_status = status.to_string();
    log::info!(
        "[{}] pipeline finished: {} ({} stages ok, {} failed)",
        report.pipeline_id,
        report.overall_status,
        report.summary.stages_completed,
        report.summary.stages_failed
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Pattern, RedundancyLevel};

    fn pipeline_intent() -> Intent {
        let mut intent = Intent::named("pipeline");
        intent.pattern = Some(Pattern::Ring);
        intent.site_count = 4;
        intent.redundancy = RedundancyLevel::Standard;
        intent.minimize_spof = false;
        intent.min_connections_per_site = 1;
        intent
    }

    #[test]
    fn successful_run_populates_everything() {
        let store = HistoryStore::open_in_memory().unwrap();
        let options = PipelineOptions {
            seed: Some(7),
            ..PipelineOptions::default()
        };
        let report = run_pipeline(&store, &pipeline_intent(), &options);

        assert_eq!(report.overall_status, "success");
        assert!(report.topology.is_some());
        assert!(report.analysis.is_some());
        assert_eq!(report.simulations.len(), 3);
        assert!(report.validation.is_some());
        assert!(report.topology_id.is_some());
        assert!(report.persistence_complete);
        assert_eq!(report.summary.stages_failed, 0);
        assert!(report.summary.satisfied);

        let (topologies, validations, simulations, _, _) = store.record_counts().unwrap();
        assert_eq!((topologies, validations, simulations), (1, 1, 3));
    }

    #[test]
    fn invalid_intent_fails_at_parse() {
        let store = HistoryStore::open_in_memory().unwrap();
        let mut intent = pipeline_intent();
        intent.site_count = 1;
        let report = run_pipeline(&store, &intent, &PipelineOptions::default());

        assert_eq!(report.overall_status, "failed");
        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.stages[0].name, "parse");
        assert_eq!(report.stages[0].status, StageStatus::Failed);
        assert!(report.topology.is_none());
    }

    #[test]
    fn synthesis_failure_is_fatal() {
        let store = HistoryStore::open_in_memory().unwrap();
        let mut intent = pipeline_intent();
        intent.redundancy = RedundancyLevel::Critical; // ring cannot reach 4
        let report = run_pipeline(&store, &intent, &PipelineOptions::default());

        assert_eq!(report.overall_status, "failed");
        let synth = report
            .stages
            .iter()
            .find(|s| s.name == "synthesize")
            .unwrap();
        assert_eq!(synth.status, StageStatus::Failed);
        assert_eq!(synth.error_kind.as_deref(), Some("unsatisfiable"));
        assert!(report.validation.is_none());

        let (topologies, _, _, _, _) = store.record_counts().unwrap();
        assert_eq!(topologies, 0);
    }

    #[test]
    fn cancellation_skips_remaining_stages() {
        let store = HistoryStore::open_in_memory().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let options = PipelineOptions {
            cancel: Some(token),
            ..PipelineOptions::default()
        };
        let report = run_pipeline(&store, &pipeline_intent(), &options);

        assert_eq!(report.overall_status, "cancelled");
        assert_eq!(report.stages.len(), 1);
        assert_eq!(report.stages[0].status, StageStatus::Cancelled);
    }

    #[test]
    fn pipeline_report_serializes() {
        let store = HistoryStore::open_in_memory().unwrap();
        let options = PipelineOptions {
            seed: Some(7),
            ..PipelineOptions::default()
        };
        let report = run_pipeline(&store, &pipeline_intent(), &options);
        let json = serde_json::to_string_pretty(&report).unwrap();
        assert!(json.contains("pipeline_id"));
        assert!(json.contains("\"overall_status\": \"success\""));
    }

    #[test]
    fn learning_advice_fills_missing_pattern() {
        let store = HistoryStore::open_in_memory().unwrap();
        let mut intent = pipeline_intent();
        intent.pattern = None;
        intent.site_count = 6;
        let options = PipelineOptions {
            seed: Some(3),
            consult_learning: true,
            ..PipelineOptions::default()
        };
        let report = run_pipeline(&store, &intent, &options);

        assert_eq!(report.overall_status, "success");
        // heuristic pick for 6 sites is full mesh
        let topo = report.topology.unwrap();
        assert_eq!(topo.device_count(), 6);
        assert_eq!(topo.link_count(), 15);

        let (_, _, _, recommendations, _) = store.record_counts().unwrap();
        assert_eq!(recommendations, 1);
    }

    #[test]
    fn missing_pattern_without_learning_fails_synthesis() {
        let store = HistoryStore::open_in_memory().unwrap();
        let mut intent = pipeline_intent();
        intent.pattern = None;
        let report = run_pipeline(&store, &intent, &PipelineOptions::default());
        assert_eq!(report.overall_status, "failed");
        let synth = report
            .stages
            .iter()
            .find(|s| s.name == "synthesize")
            .unwrap();
        assert_eq!(synth.error_kind.as_deref(), Some("invalid_intent"));
    }
}
