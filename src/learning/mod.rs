//! Recommendation and autonomous optimization.
//!
//! Scores topology patterns for an intent using the historical aggregates
//! in the history store, falling back to per-pattern heuristics when no
//! history exists. The autonomous optimizer compares the caller's chosen
//! pattern against history and overrides it when another pattern has a
//! materially better track record.

use serde::Serialize;

use crate::error::CoreError;
use crate::history::{HistoryStore, PerformanceMetric};
use crate::intent::{DesignGoal, Intent, Pattern, RedundancyLevel};
use crate::topology::synthesizer::leaf_spine_split;

/// Composite score weights: validation, satisfaction, resilience.
const WEIGHT_OVERALL: f64 = 0.40;
const WEIGHT_SATISFACTION: f64 = 0.35;
const WEIGHT_RESILIENCE: f64 = 0.25;

/// Confidence reported for heuristic (no-history) recommendations.
const HEURISTIC_CONFIDENCE: f64 = 30.0;
/// Below this confidence a recommendation counts as heuristic.
const HEURISTIC_THRESHOLD: f64 = 40.0;

/// Composite advantage required before the optimizer overrides a choice.
const OVERRIDE_MARGIN: f64 = 10.0;
/// Confidence floor for an override.
const OVERRIDE_CONFIDENCE: f64 = 60.0;

/// One ranked candidate pattern.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPattern {
    pub pattern: Pattern,
    pub composite_score: f64,
    pub confidence: f64,
    /// Site-count fitness in [0, 1].
    pub suitability: f64,
    pub based_on_history: bool,
    pub reason: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub estimated_links: u32,
    pub typical_diameter: String,
}

impl ScoredPattern {
    /// "historical" above the confidence threshold, "heuristic" below.
    pub fn confidence_label(&self) -> &'static str {
        if self.confidence < HEURISTIC_THRESHOLD {
            "heuristic"
        } else {
            "historical"
        }
    }
}

/// Ranked recommendation plus the persisted record id.
#[derive(Debug)]
pub struct Recommendation {
    pub ranked: Vec<ScoredPattern>,
    pub record_id: i64,
}

/// Decision emitted when the optimizer overrides the chosen pattern.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationDecision {
    pub original: Pattern,
    pub adjusted: Pattern,
    pub reason: String,
    pub expected_improvement: f64,
    pub confidence: f64,
    pub record_id: i64,
}

/// (min, ideal, max) site counts per pattern.
fn suitability_range(pattern: Pattern) -> (u32, u32, u32) {
    match pattern {
        Pattern::FullMesh => (3, 6, 10),
        Pattern::HubSpoke => (3, 20, 500),
        Pattern::Ring => (3, 10, 100),
        Pattern::Tree => (5, 50, 500),
        Pattern::LeafSpine => (4, 30, 500),
        Pattern::Hybrid => (5, 100, 500),
    }
}

/// Site-count fitness factor: 1.0 at the ideal, falling linearly to 0.5 at
/// the range edge, 0 outside the range.
pub fn suitability(pattern: Pattern, site_count: u32) -> f64 {
    let (min, ideal, max) = suitability_range(pattern);
    if site_count < min || site_count > max {
        return 0.0;
    }
    let distance = f64::from(site_count.abs_diff(ideal));
    let max_distance = f64::from((ideal - min).max(max - ideal)).max(1.0);
    (1.0 - distance / max_distance * 0.5).max(0.5)
}

fn composite_from_metric(metric: &PerformanceMetric, suitability: f64) -> f64 {
    (WEIGHT_OVERALL * metric.avg_overall
        + WEIGHT_SATISFACTION * metric.satisfaction_rate
        + WEIGHT_RESILIENCE * (100.0 - metric.avg_resilience_impact))
        * suitability
}

/// Heuristic fallback when a key has no history: base compatibility plus
/// intent-fit bonuses.
fn heuristic_score(pattern: Pattern, intent: &Intent) -> f64 {
    let mut score: f64 = match pattern {
        Pattern::FullMesh => 85.0,
        Pattern::LeafSpine => 82.0,
        Pattern::Hybrid => 80.0,
        Pattern::Tree => 78.0,
        Pattern::Ring => 75.0,
        Pattern::HubSpoke => 65.0,
    };

    let sites = intent.site_count;
    match pattern {
        Pattern::FullMesh if sites <= 6 => score += 10.0,
        Pattern::LeafSpine
            if sites >= 8
                && (intent.design_goal == DesignGoal::Latency
                    || intent.design_goal == DesignGoal::Scalability
                    || intent.redundancy >= RedundancyLevel::High) =>
        {
            score += 12.0
        }
        Pattern::HubSpoke if intent.design_goal == DesignGoal::Cost => score += 10.0,
        Pattern::Tree if sites >= 20 && intent.redundancy == RedundancyLevel::Standard => {
            score += 10.0
        }
        Pattern::Ring
            if (4..=12).contains(&sites)
                && (intent.redundancy == RedundancyLevel::Standard
                    || intent.redundancy == RedundancyLevel::High) =>
        {
            score += 8.0
        }
        _ => {}
    }
    score.min(100.0)
}

fn estimated_links(pattern: Pattern, sites: u32) -> u32 {
    match pattern {
        Pattern::FullMesh => sites * sites.saturating_sub(1) / 2,
        Pattern::HubSpoke => sites.saturating_sub(1),
        Pattern::Ring => sites,
        Pattern::Tree => sites.saturating_sub(1),
        Pattern::LeafSpine => {
            let (leaves, spines) = leaf_spine_split(sites);
            leaves * spines
        }
        Pattern::Hybrid => sites * 3 / 2,
    }
}

fn typical_diameter(pattern: Pattern) -> &'static str {
    match pattern {
        Pattern::FullMesh => "1",
        Pattern::HubSpoke => "2",
        Pattern::Ring => "varies (n/2 max)",
        Pattern::Tree => "4-6 typical",
        Pattern::LeafSpine => "2",
        Pattern::Hybrid => "varies",
    }
}

fn pattern_pros(pattern: Pattern) -> Vec<String> {
    let pros: &[&str] = match pattern {
        Pattern::FullMesh => &[
            "Maximum redundancy and path diversity",
            "Single-hop reachability between all sites",
            "No single points of failure",
        ],
        Pattern::HubSpoke => &[
            "Lowest link count and cost",
            "Simple to manage and extend",
            "Fits large branch networks",
        ],
        Pattern::Ring => &[
            "Two disjoint paths from minimal links",
            "Scales to hundreds of devices",
            "Low cost compared to mesh",
        ],
        Pattern::Tree => &[
            "Hierarchical, organized structure",
            "Scales to large device counts",
            "Core can mesh while access stays simple",
        ],
        Pattern::LeafSpine => &[
            "Data-center optimized",
            "Predictable two-hop latency",
            "High east-west throughput",
        ],
        Pattern::Hybrid => &[
            "Combines patterns per region",
            "Optimizable layer by layer",
            "Fits complex organizations",
        ],
    };
    pros.iter().map(|s| s.to_string()).collect()
}

fn pattern_cons(pattern: Pattern) -> Vec<String> {
    let cons: &[&str] = match pattern {
        Pattern::FullMesh => &[
            "Quadratic link count and cost",
            "Impractical beyond ~10 sites",
            "Heavy configuration surface",
        ],
        Pattern::HubSpoke => &[
            "Hub is a single point of failure",
            "All traffic transits the hub",
            "Hub becomes a bottleneck at scale",
        ],
        Pattern::Ring => &[
            "Limited diversity for non-adjacent sites",
            "Diameter grows with site count",
            "A second failure can partition the ring",
        ],
        Pattern::Tree => &[
            "Aggregation layer can hide SPOFs",
            "Needs deliberate redundancy design",
        ],
        Pattern::LeafSpine => &[
            "More links than hierarchical designs",
            "Needs equal-cost multipath routing",
        ],
        Pattern::Hybrid => &[
            "Hardest to manage uniformly",
            "Requires expertise to balance regions",
        ],
    };
    cons.iter().map(|s| s.to_string()).collect()
}

fn metric_reason(metric: &PerformanceMetric) -> String {
    let mut parts = Vec::new();
    if metric.avg_overall >= 85.0 {
        parts.push(format!("excellent validation ({:.0})", metric.avg_overall));
    } else if metric.avg_overall >= 75.0 {
        parts.push(format!("good validation ({:.0})", metric.avg_overall));
    }
    if metric.satisfaction_rate >= 90.0 {
        parts.push(format!(
            "high intent satisfaction ({:.0}%)",
            metric.satisfaction_rate
        ));
    } else if metric.satisfaction_rate >= 75.0 {
        parts.push(format!(
            "reliable intent satisfaction ({:.0}%)",
            metric.satisfaction_rate
        ));
    }
    if metric.avg_resilience_impact <= 20.0 {
        parts.push("strong failure resilience".to_string());
    } else if metric.avg_resilience_impact <= 35.0 {
        parts.push("good resilience".to_string());
    }
    if metric.spof_elimination_rate >= 80.0 {
        parts.push("effective SPOF elimination".to_string());
    }
    if parts.is_empty() {
        parts.push(format!(
            "{} recorded runs of mixed quality",
            metric.sample_size
        ));
    }
    format!("based on {}", parts.join(", "))
}

/// Score one pattern for the intent, None when the site count makes the
/// pattern unsuitable.
fn score_pattern(
    store: &HistoryStore,
    intent: &Intent,
    pattern: Pattern,
) -> Result<Option<ScoredPattern>, CoreError> {
    let fit = suitability(pattern, intent.site_count);
    if fit <= 0.0 {
        return Ok(None);
    }

    let metric = store.metric_for(
        pattern.as_str(),
        intent.redundancy.as_str(),
        intent.design_goal.as_str(),
    )?;

    let (composite, confidence, based_on_history, reason) = match metric {
        Some(ref m) if m.sample_size > 0 => {
            let confidence = if m.sample_size < 3 {
                HEURISTIC_CONFIDENCE.min(m.confidence)
            } else {
                m.confidence
            };
            (
                composite_from_metric(m, fit),
                confidence,
                true,
                metric_reason(m),
            )
        }
        _ => (
            heuristic_score(pattern, intent) * fit,
            HEURISTIC_CONFIDENCE,
            false,
            format!(
                "heuristic fit for {} redundancy at {} sites",
                intent.redundancy.as_str(),
                intent.site_count
            ),
        ),
    };

    Ok(Some(ScoredPattern {
        pattern,
        composite_score: (composite * 100.0).round() / 100.0,
        confidence,
        suitability: fit,
        based_on_history,
        reason,
        pros: pattern_pros(pattern),
        cons: pattern_cons(pattern),
        estimated_links: estimated_links(pattern, intent.site_count),
        typical_diameter: typical_diameter(pattern).to_string(),
    }))
}

/// Rank candidate patterns for an intent and persist the recommendation.
pub fn recommend(
    store: &HistoryStore,
    intent: &Intent,
    top_k: usize,
) -> Result<Recommendation, CoreError> {
    let mut ranked = Vec::new();
    for pattern in Pattern::ALL {
        if let Some(scored) = score_pattern(store, intent, pattern)? {
            ranked.push(scored);
        }
    }
    ranked.sort_by(|a, b| {
        b.composite_score
            .partial_cmp(&a.composite_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.pattern.as_str().cmp(b.pattern.as_str()))
    });
    ranked.truncate(top_k.max(1));

    let alternatives = serde_json::to_string(&ranked).unwrap_or_else(|_| "[]".to_string());
    let record_id = match ranked.first() {
        Some(top) => {
            log::info!(
                "recommending {} for '{}' (composite {:.1}, {} confidence {:.0})",
                top.pattern.as_str(),
                intent.name,
                top.composite_score,
                top.confidence_label(),
                top.confidence
            );
            store.record_recommendation(
                intent,
                top.pattern.as_str(),
                top.confidence,
                &alternatives,
            )?
        }
        None => {
            log::warn!(
                "no pattern suits {} sites; recommendation is empty",
                intent.site_count
            );
            store.record_recommendation(intent, "none", 0.0, "[]")?
        }
    };

    Ok(Recommendation { ranked, record_id })
}

/// Check whether history argues for a different pattern than the caller's
/// choice. Overrides need a composite advantage of at least 10 points at
/// confidence 60 or better, and are written to the optimization log.
pub fn consider_override(
    store: &HistoryStore,
    intent: &Intent,
    chosen: Pattern,
) -> Result<Option<OptimizationDecision>, CoreError> {
    let chosen_score = score_pattern(store, intent, chosen)?
        .map(|s| s.composite_score)
        .unwrap_or(0.0);

    let mut best: Option<(f64, PerformanceMetric)> = None;
    for metric in store.metrics_matching(intent.redundancy.as_str(), intent.design_goal.as_str())? {
        if metric.pattern == chosen.as_str() || metric.confidence < OVERRIDE_CONFIDENCE {
            continue;
        }
        let Some(pattern) = Pattern::from_str_label(&metric.pattern) else {
            continue;
        };
        let fit = suitability(pattern, intent.site_count);
        if fit <= 0.0 {
            continue;
        }
        let composite = composite_from_metric(&metric, fit);
        if best.as_ref().map_or(true, |(b, _)| composite > *b) {
            best = Some((composite, metric));
        }
    }

    let Some((best_score, metric)) = best else {
        return Ok(None);
    };
    if best_score < chosen_score + OVERRIDE_MARGIN {
        return Ok(None);
    }
    let adjusted =
        Pattern::from_str_label(&metric.pattern).expect("pattern label validated above");

    let expected_improvement = ((best_score - chosen_score).max(0.0) * 10.0).round() / 10.0;
    let reason = format!(
        "{} outscores {} by {:.1} composite points over {} runs ({})",
        metric.pattern,
        chosen.as_str(),
        best_score - chosen_score,
        metric.sample_size,
        metric_reason(&metric)
    );

    let record_id = store.record_optimization(
        intent,
        chosen.as_str(),
        &metric.pattern,
        &reason,
        expected_improvement,
    )?;

    log::info!(
        "autonomous override for '{}': {} -> {} (expected +{:.1})",
        intent.name,
        chosen.as_str(),
        metric.pattern,
        expected_improvement
    );

    Ok(Some(OptimizationDecision {
        original: chosen,
        adjusted,
        reason,
        expected_improvement,
        confidence: metric.confidence,
        record_id,
    }))
}

/// Back-fill the measured improvement for an override once the resulting
/// topology's validation score is known, comparing against the original
/// pattern's historical baseline.
pub fn record_override_outcome(
    store: &HistoryStore,
    decision: &OptimizationDecision,
    intent: &Intent,
    achieved_overall: f64,
) -> Result<(), CoreError> {
    let baseline = store
        .metric_for(
            decision.original.as_str(),
            intent.redundancy.as_str(),
            intent.design_goal.as_str(),
        )?
        .map(|m| m.avg_overall)
        .unwrap_or(achieved_overall);
    let actual = ((achieved_overall - baseline) * 10.0).round() / 10.0;
    store.set_optimization_outcome(decision.record_id, actual)?;
    log::debug!(
        "override #{} actual improvement {:.1} (achieved {:.1} vs baseline {:.1})",
        decision.record_id,
        actual,
        achieved_overall,
        baseline
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::simulation::{generate_test_scenarios, simulate};
    use crate::topology::synthesizer::Synthesizer;
    use crate::validation::validate;

    fn seeded_store(runs_per_pattern: &[(Pattern, usize)]) -> HistoryStore {
        let store = HistoryStore::open_in_memory().unwrap();
        for (pattern, runs) in runs_per_pattern {
            for run in 0..*runs {
                let mut intent = Intent::named(&format!("seed-{}-{}", pattern.as_str(), run));
                intent.pattern = Some(*pattern);
                intent.site_count = 6;
                intent.redundancy = RedundancyLevel::Standard;
                intent.minimize_spof = false;
                intent.min_connections_per_site = 1;
                if *pattern == Pattern::HubSpoke {
                    // recorded against a one-hop ceiling, so this pattern
                    // accumulates weak history for the key
                    intent.max_hops = 1;
                }

                let topo = Synthesizer::new(Some(run as u64))
                    .synthesize(&intent)
                    .unwrap();
                let analysis = analyze(&topo);
                let id = store.record_topology(&intent, &topo, &analysis).unwrap();
                let sims: Vec<_> = generate_test_scenarios(&topo)
                    .iter()
                    .map(|s| simulate(&topo, s).unwrap())
                    .collect();
                for sim in &sims {
                    store.record_simulation(id, sim).unwrap();
                }
                let validation = validate(&topo, &intent, &analysis, &sims).unwrap();
                store.record_validation(id, &validation, 1.0).unwrap();
            }
        }
        store
    }

    fn standard_intent(sites: u32) -> Intent {
        let mut intent = Intent::named("learn");
        intent.site_count = sites;
        intent.redundancy = RedundancyLevel::Standard;
        intent.minimize_spof = false;
        intent.min_connections_per_site = 1;
        intent
    }

    #[test]
    fn empty_history_falls_back_to_heuristics() {
        let store = HistoryStore::open_in_memory().unwrap();
        let recommendation = recommend(&store, &standard_intent(6), 5).unwrap();

        assert!(!recommendation.ranked.is_empty());
        let top = &recommendation.ranked[0];
        assert!(!top.based_on_history);
        assert_eq!(top.confidence, HEURISTIC_CONFIDENCE);
        assert_eq!(top.confidence_label(), "heuristic");
        // full mesh at its ideal site count wins the heuristic table
        assert_eq!(top.pattern, Pattern::FullMesh);
        assert!(!top.pros.is_empty() && !top.cons.is_empty());
    }

    #[test]
    fn cost_goal_boosts_hub_spoke_heuristic() {
        let store = HistoryStore::open_in_memory().unwrap();
        let mut intent = standard_intent(30);
        intent.design_goal = DesignGoal::Cost;
        let recommendation = recommend(&store, &intent, 6).unwrap();
        let hub = recommendation
            .ranked
            .iter()
            .find(|s| s.pattern == Pattern::HubSpoke)
            .unwrap();
        assert!(hub.composite_score > 70.0);
    }

    #[test]
    fn history_outranks_heuristics_with_confidence() {
        let store = seeded_store(&[(Pattern::FullMesh, 10), (Pattern::HubSpoke, 10)]);
        let recommendation = recommend(&store, &standard_intent(6), 5).unwrap();

        let top = &recommendation.ranked[0];
        assert_eq!(top.pattern, Pattern::FullMesh);
        assert!(top.based_on_history);
        assert!(top.confidence >= 80.0);

        let hub = recommendation
            .ranked
            .iter()
            .find(|s| s.pattern == Pattern::HubSpoke)
            .unwrap();
        assert!(top.composite_score >= hub.composite_score + 10.0);

        let record = store
            .recommendation_record(recommendation.record_id)
            .unwrap()
            .unwrap();
        assert_eq!(record.recommended_pattern, "full_mesh");
    }

    #[test]
    fn sparse_history_reports_heuristic_confidence() {
        let store = seeded_store(&[(Pattern::Ring, 2)]);
        let recommendation = recommend(&store, &standard_intent(6), 6).unwrap();
        let ring = recommendation
            .ranked
            .iter()
            .find(|s| s.pattern == Pattern::Ring)
            .unwrap();
        assert!(ring.based_on_history);
        assert!(ring.confidence < 40.0);
        assert_eq!(ring.confidence_label(), "heuristic");
    }

    #[test]
    fn optimizer_overrides_weak_choice() {
        let store = seeded_store(&[(Pattern::FullMesh, 10), (Pattern::HubSpoke, 10)]);
        let intent = standard_intent(6);

        let decision = consider_override(&store, &intent, Pattern::HubSpoke)
            .unwrap()
            .expect("override expected");
        assert_eq!(decision.adjusted, Pattern::FullMesh);
        assert!(decision.expected_improvement > 0.0);
        assert!(decision.confidence >= OVERRIDE_CONFIDENCE);

        let record = store
            .optimization_record(decision.record_id)
            .unwrap()
            .unwrap();
        assert_eq!(record.original_pattern, "hub_spoke");
        assert_eq!(record.adjusted_pattern, "full_mesh");
        assert_eq!(record.actual_improvement, None);
    }

    #[test]
    fn optimizer_respects_good_choices_and_low_confidence() {
        let store = seeded_store(&[(Pattern::FullMesh, 10), (Pattern::HubSpoke, 10)]);
        let intent = standard_intent(6);
        // already the best pattern: no override
        assert!(consider_override(&store, &intent, Pattern::FullMesh)
            .unwrap()
            .is_none());

        // thin history: confidence below the override floor
        let sparse = seeded_store(&[(Pattern::FullMesh, 3), (Pattern::HubSpoke, 3)]);
        assert!(consider_override(&sparse, &intent, Pattern::HubSpoke)
            .unwrap()
            .is_none());
    }

    #[test]
    fn override_outcome_uses_historical_baseline() {
        let store = seeded_store(&[(Pattern::FullMesh, 10), (Pattern::HubSpoke, 10)]);
        let intent = standard_intent(6);
        let decision = consider_override(&store, &intent, Pattern::HubSpoke)
            .unwrap()
            .unwrap();

        let baseline = store
            .metric_for("hub_spoke", "standard", "redundancy")
            .unwrap()
            .unwrap()
            .avg_overall;
        record_override_outcome(&store, &decision, &intent, baseline + 7.5).unwrap();

        let record = store
            .optimization_record(decision.record_id)
            .unwrap()
            .unwrap();
        assert_eq!(record.actual_improvement, Some(7.5));
    }

    #[test]
    fn suitability_peaks_at_ideal_and_cuts_off() {
        assert_eq!(suitability(Pattern::FullMesh, 6), 1.0);
        assert!(suitability(Pattern::FullMesh, 10) >= 0.5);
        assert_eq!(suitability(Pattern::FullMesh, 11), 0.0);
        assert_eq!(suitability(Pattern::Tree, 2), 0.0);
        assert!(suitability(Pattern::HubSpoke, 20) > suitability(Pattern::HubSpoke, 400));
    }
}
