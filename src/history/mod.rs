//! Persistent history of generations, validations, simulations,
//! recommendations, and optimizations.
//!
//! Backed by SQLite. The schema is internal: callers only see the record
//! types and aggregate queries, so the engine can be swapped without
//! touching the rest of the pipeline. Inserts are atomic per record; the
//! `performance_metrics` projection for the affected key is recomputed
//! from base tables inside the same transaction, which keeps it in exact
//! agreement with a from-scratch rebuild.

use std::path::Path;
use std::sync::Mutex;

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;

use crate::analysis::AnalysisResult;
use crate::error::CoreError;
use crate::intent::Intent;
use crate::simulation::SimulationResult;
use crate::topology::Topology;
use crate::validation::ValidationResult;

/// Explicit feedback outranks automated scoring by this factor in the
/// satisfaction aggregate.
const FEEDBACK_WEIGHT: f64 = 5.0;

const SCHEMA_VERSION: i64 = 1;

/// Stored metadata about one generated topology.
#[derive(Debug, Clone, Serialize)]
pub struct TopologyRecord {
    pub id: i64,
    pub intent_name: String,
    pub pattern: String,
    pub site_count: u32,
    pub device_count: u32,
    pub link_count: u32,
    pub redundancy: String,
    pub protocol: String,
    pub design_goal: String,
    pub minimize_spof: bool,
    pub avg_degree: f64,
    pub diameter: u32,
    pub created_at: String,
}

/// Rolling aggregate for one (pattern, redundancy, design_goal) key.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetric {
    pub pattern: String,
    pub redundancy: String,
    pub design_goal: String,
    pub sample_size: u32,
    pub avg_overall: f64,
    pub avg_redundancy: f64,
    pub avg_path_diversity: f64,
    /// Mean connectivity loss across simulations; lower is better.
    pub avg_resilience_impact: f64,
    pub spof_elimination_rate: f64,
    pub satisfaction_rate: f64,
    pub confidence: f64,
}

/// Stored recommendation with its eventual user outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RecommendationRecord {
    pub id: i64,
    pub recommended_pattern: String,
    pub confidence: f64,
    pub user_selected: Option<String>,
    pub resulting_topology_id: Option<i64>,
    /// 1-5 stars, or -1 when absent.
    pub feedback: i64,
}

/// Audit entry for one autonomous pattern override.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizationRecord {
    pub id: i64,
    pub original_pattern: String,
    pub adjusted_pattern: String,
    pub reason: String,
    pub expected_improvement: f64,
    pub actual_improvement: Option<f64>,
}

/// SQLite-backed store. Cheap to share behind a reference; the inner
/// connection is serialized by a mutex.
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (and migrate) a file-backed store.
    pub fn open(path: &Path) -> Result<HistoryStore, CoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory store; used by tests and throwaway runs.
    pub fn open_in_memory() -> Result<HistoryStore, CoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<HistoryStore, CoreError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        Self::create_schema(&conn)?;
        Ok(HistoryStore {
            conn: Mutex::new(conn),
        })
    }

    fn create_schema(conn: &Connection) -> Result<(), CoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_info (version INTEGER NOT NULL);

            CREATE TABLE IF NOT EXISTS topology_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                intent_json TEXT NOT NULL,
                intent_name TEXT NOT NULL,
                pattern TEXT NOT NULL,
                site_count INTEGER NOT NULL,
                device_count INTEGER NOT NULL,
                link_count INTEGER NOT NULL,
                redundancy TEXT NOT NULL,
                protocol TEXT NOT NULL,
                design_goal TEXT NOT NULL,
                minimize_spof INTEGER NOT NULL,
                avg_degree REAL NOT NULL,
                diameter INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_topology_key
                ON topology_records(pattern, redundancy, design_goal);

            CREATE TABLE IF NOT EXISTS validation_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topology_id INTEGER NOT NULL REFERENCES topology_records(id),
                satisfied INTEGER NOT NULL,
                overall_score REAL NOT NULL,
                redundancy_score REAL NOT NULL,
                path_diversity_score REAL NOT NULL,
                max_hops_ok INTEGER NOT NULL,
                spof_eliminated INTEGER NOT NULL,
                pattern_matched INTEGER NOT NULL,
                violations_json TEXT NOT NULL,
                duration_ms REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_validation_topology
                ON validation_records(topology_id);

            CREATE TABLE IF NOT EXISTS simulation_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                topology_id INTEGER NOT NULL REFERENCES topology_records(id),
                scenario_kind TEXT NOT NULL,
                scenario_json TEXT NOT NULL,
                partitioned INTEGER NOT NULL,
                isolated_count INTEGER NOT NULL,
                components_count INTEGER NOT NULL,
                resilience_impact REAL NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_simulation_topology
                ON simulation_records(topology_id);

            CREATE TABLE IF NOT EXISTS performance_metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pattern TEXT NOT NULL,
                redundancy TEXT NOT NULL,
                design_goal TEXT NOT NULL,
                sample_size INTEGER NOT NULL,
                avg_overall REAL NOT NULL,
                avg_redundancy REAL NOT NULL,
                avg_path_diversity REAL NOT NULL,
                avg_resilience_impact REAL NOT NULL,
                spof_elimination_rate REAL NOT NULL,
                satisfaction_rate REAL NOT NULL,
                confidence REAL NOT NULL,
                last_updated TEXT NOT NULL,
                UNIQUE(pattern, redundancy, design_goal)
            );

            CREATE TABLE IF NOT EXISTS recommendation_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                intent_json TEXT NOT NULL,
                redundancy TEXT NOT NULL,
                design_goal TEXT NOT NULL,
                recommended_pattern TEXT NOT NULL,
                confidence REAL NOT NULL,
                alternatives_json TEXT NOT NULL,
                user_selected TEXT,
                resulting_topology_id INTEGER REFERENCES topology_records(id),
                feedback INTEGER NOT NULL DEFAULT -1,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS optimization_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                intent_json TEXT NOT NULL,
                original_pattern TEXT NOT NULL,
                adjusted_pattern TEXT NOT NULL,
                reason TEXT NOT NULL,
                expected_improvement REAL NOT NULL,
                actual_improvement REAL,
                created_at TEXT NOT NULL
            );",
        )?;

        let version: Option<i64> = conn
            .query_row("SELECT version FROM schema_info LIMIT 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        if version.is_none() {
            conn.execute("INSERT INTO schema_info (version) VALUES (?1)", [SCHEMA_VERSION])?;
        }
        Ok(())
    }

    /// Persist a generated topology. Returns the new record id.
    pub fn record_topology(
        &self,
        intent: &Intent,
        topology: &Topology,
        analysis: &AnalysisResult,
    ) -> Result<i64, CoreError> {
        let intent_json =
            serde_json::to_string(intent).map_err(|e| CoreError::InvalidIntent {
                reason: format!("intent not serializable: {}", e),
                hint: "report this as a bug".into(),
            })?;
        let pattern = intent
            .pattern
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "unspecified".to_string());

        let conn = self.conn.lock().expect("history mutex poisoned");
        conn.execute(
            "INSERT INTO topology_records
                (intent_json, intent_name, pattern, site_count, device_count,
                 link_count, redundancy, protocol, design_goal, minimize_spof,
                 avg_degree, diameter, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                intent_json,
                intent.name,
                pattern,
                intent.site_count,
                topology.device_count() as u32,
                topology.link_count() as u32,
                intent.redundancy.as_str(),
                intent.protocol.as_str(),
                intent.design_goal.as_str(),
                intent.minimize_spof,
                topology.avg_degree(),
                analysis.metrics.diameter,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();
        log::debug!("recorded topology '{}' as #{}", topology.name, id);
        Ok(id)
    }

    /// Persist a validation and refresh the affected aggregate atomically.
    pub fn record_validation(
        &self,
        topology_id: i64,
        result: &ValidationResult,
        duration_ms: f64,
    ) -> Result<i64, CoreError> {
        let violations_json = serde_json::to_string(&result.violations)
            .unwrap_or_else(|_| "[]".to_string());

        let mut conn = self.conn.lock().expect("history mutex poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO validation_records
                (topology_id, satisfied, overall_score, redundancy_score,
                 path_diversity_score, max_hops_ok, spof_eliminated,
                 pattern_matched, violations_json, duration_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                topology_id,
                result.satisfied,
                result.overall_score,
                result.redundancy_score,
                result.path_diversity_score,
                result.max_hops_ok,
                result.spof_eliminated,
                result.pattern_matched,
                violations_json,
                duration_ms,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        Self::refresh_metric_for_topology(&tx, topology_id)?;
        tx.commit()?;
        Ok(id)
    }

    /// Persist a simulation and refresh the affected aggregate atomically.
    pub fn record_simulation(
        &self,
        topology_id: i64,
        result: &SimulationResult,
    ) -> Result<i64, CoreError> {
        let scenario_json =
            serde_json::to_string(&result.scenario).unwrap_or_else(|_| "{}".to_string());

        let mut conn = self.conn.lock().expect("history mutex poisoned");
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO simulation_records
                (topology_id, scenario_kind, scenario_json, partitioned,
                 isolated_count, components_count, resilience_impact, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                topology_id,
                result.scenario.kind(),
                scenario_json,
                result.partitioned,
                result.isolated_count as u32,
                result.components.len() as u32,
                result.connectivity_loss_pct,
                Utc::now().to_rfc3339(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        Self::refresh_metric_for_topology(&tx, topology_id)?;
        tx.commit()?;
        Ok(id)
    }

    /// Persist a recommendation. Alternatives arrive pre-serialized so the
    /// store stays agnostic of the recommender's ranking shape.
    pub fn record_recommendation(
        &self,
        intent: &Intent,
        recommended_pattern: &str,
        confidence: f64,
        alternatives_json: &str,
    ) -> Result<i64, CoreError> {
        let intent_json = serde_json::to_string(intent).unwrap_or_else(|_| "{}".to_string());
        let conn = self.conn.lock().expect("history mutex poisoned");
        conn.execute(
            "INSERT INTO recommendation_records
                (intent_json, redundancy, design_goal, recommended_pattern,
                 confidence, alternatives_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                intent_json,
                intent.redundancy.as_str(),
                intent.design_goal.as_str(),
                recommended_pattern,
                confidence,
                alternatives_json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Write-once user outcome for a recommendation. A second call is a
    /// no-op returning false.
    pub fn set_recommendation_feedback(
        &self,
        recommendation_id: i64,
        user_selected: &str,
        resulting_topology_id: Option<i64>,
        feedback: i64,
    ) -> Result<bool, CoreError> {
        let mut conn = self.conn.lock().expect("history mutex poisoned");
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE recommendation_records
                SET user_selected = ?2, resulting_topology_id = ?3, feedback = ?4
              WHERE id = ?1 AND user_selected IS NULL",
            params![recommendation_id, user_selected, resulting_topology_id, feedback],
        )?;
        if changed > 0 {
            // Feedback feeds the satisfaction aggregate for the selected
            // pattern's key.
            let key: Option<(String, String)> = tx
                .query_row(
                    "SELECT redundancy, design_goal FROM recommendation_records WHERE id = ?1",
                    [recommendation_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            if let Some((redundancy, goal)) = key {
                Self::refresh_metric(&tx, user_selected, &redundancy, &goal)?;
            }
        }
        tx.commit()?;
        Ok(changed > 0)
    }

    /// Persist an autonomous optimization decision.
    pub fn record_optimization(
        &self,
        intent: &Intent,
        original_pattern: &str,
        adjusted_pattern: &str,
        reason: &str,
        expected_improvement: f64,
    ) -> Result<i64, CoreError> {
        let intent_json = serde_json::to_string(intent).unwrap_or_else(|_| "{}".to_string());
        let conn = self.conn.lock().expect("history mutex poisoned");
        conn.execute(
            "INSERT INTO optimization_records
                (intent_json, original_pattern, adjusted_pattern, reason,
                 expected_improvement, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                intent_json,
                original_pattern,
                adjusted_pattern,
                reason,
                expected_improvement,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Back-fill the measured improvement once a validation landed for the
    /// optimized topology.
    pub fn set_optimization_outcome(
        &self,
        optimization_id: i64,
        actual_improvement: f64,
    ) -> Result<(), CoreError> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        conn.execute(
            "UPDATE optimization_records SET actual_improvement = ?2 WHERE id = ?1",
            params![optimization_id, actual_improvement],
        )?;
        Ok(())
    }

    pub fn topology_record(&self, id: i64) -> Result<Option<TopologyRecord>, CoreError> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        let record = conn
            .query_row(
                "SELECT id, intent_name, pattern, site_count, device_count, link_count,
                        redundancy, protocol, design_goal, minimize_spof, avg_degree,
                        diameter, created_at
                   FROM topology_records WHERE id = ?1",
                [id],
                Self::row_to_topology,
            )
            .optional()?;
        Ok(record)
    }

    /// Topology records created within the last `days` days, newest first.
    pub fn recent_topologies(&self, days: i64) -> Result<Vec<TopologyRecord>, CoreError> {
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
        let conn = self.conn.lock().expect("history mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, intent_name, pattern, site_count, device_count, link_count,
                    redundancy, protocol, design_goal, minimize_spof, avg_degree,
                    diameter, created_at
               FROM topology_records
              WHERE created_at >= ?1
              ORDER BY created_at DESC, id DESC",
        )?;
        let rows = stmt.query_map([cutoff], Self::row_to_topology)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn row_to_topology(row: &rusqlite::Row<'_>) -> rusqlite::Result<TopologyRecord> {
        Ok(TopologyRecord {
            id: row.get(0)?,
            intent_name: row.get(1)?,
            pattern: row.get(2)?,
            site_count: row.get(3)?,
            device_count: row.get(4)?,
            link_count: row.get(5)?,
            redundancy: row.get(6)?,
            protocol: row.get(7)?,
            design_goal: row.get(8)?,
            minimize_spof: row.get(9)?,
            avg_degree: row.get(10)?,
            diameter: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    /// Aggregate for one key, if any run has touched it.
    pub fn metric_for(
        &self,
        pattern: &str,
        redundancy: &str,
        design_goal: &str,
    ) -> Result<Option<PerformanceMetric>, CoreError> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        let metric = conn
            .query_row(
                "SELECT pattern, redundancy, design_goal, sample_size, avg_overall,
                        avg_redundancy, avg_path_diversity, avg_resilience_impact,
                        spof_elimination_rate, satisfaction_rate, confidence
                   FROM performance_metrics
                  WHERE pattern = ?1 AND redundancy = ?2 AND design_goal = ?3",
                params![pattern, redundancy, design_goal],
                Self::row_to_metric,
            )
            .optional()?;
        Ok(metric)
    }

    /// All aggregates matching a redundancy level and design goal.
    pub fn metrics_matching(
        &self,
        redundancy: &str,
        design_goal: &str,
    ) -> Result<Vec<PerformanceMetric>, CoreError> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT pattern, redundancy, design_goal, sample_size, avg_overall,
                    avg_redundancy, avg_path_diversity, avg_resilience_impact,
                    spof_elimination_rate, satisfaction_rate, confidence
               FROM performance_metrics
              WHERE redundancy = ?1 AND design_goal = ?2
              ORDER BY pattern",
        )?;
        let rows = stmt.query_map(params![redundancy, design_goal], Self::row_to_metric)?;
        let mut metrics = Vec::new();
        for row in rows {
            metrics.push(row?);
        }
        Ok(metrics)
    }

    fn row_to_metric(row: &rusqlite::Row<'_>) -> rusqlite::Result<PerformanceMetric> {
        Ok(PerformanceMetric {
            pattern: row.get(0)?,
            redundancy: row.get(1)?,
            design_goal: row.get(2)?,
            sample_size: row.get(3)?,
            avg_overall: row.get(4)?,
            avg_redundancy: row.get(5)?,
            avg_path_diversity: row.get(6)?,
            avg_resilience_impact: row.get(7)?,
            spof_elimination_rate: row.get(8)?,
            satisfaction_rate: row.get(9)?,
            confidence: row.get(10)?,
        })
    }

    pub fn recommendation_record(
        &self,
        id: i64,
    ) -> Result<Option<RecommendationRecord>, CoreError> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        let record = conn
            .query_row(
                "SELECT id, recommended_pattern, confidence, user_selected,
                        resulting_topology_id, feedback
                   FROM recommendation_records WHERE id = ?1",
                [id],
                |row| {
                    Ok(RecommendationRecord {
                        id: row.get(0)?,
                        recommended_pattern: row.get(1)?,
                        confidence: row.get(2)?,
                        user_selected: row.get(3)?,
                        resulting_topology_id: row.get(4)?,
                        feedback: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn optimization_record(
        &self,
        id: i64,
    ) -> Result<Option<OptimizationRecord>, CoreError> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        let record = conn
            .query_row(
                "SELECT id, original_pattern, adjusted_pattern, reason,
                        expected_improvement, actual_improvement
                   FROM optimization_records WHERE id = ?1",
                [id],
                |row| {
                    Ok(OptimizationRecord {
                        id: row.get(0)?,
                        original_pattern: row.get(1)?,
                        adjusted_pattern: row.get(2)?,
                        reason: row.get(3)?,
                        expected_improvement: row.get(4)?,
                        actual_improvement: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Maintenance entry point: rebuild every aggregate row from the base
    /// tables. Incremental updates must agree with this.
    pub fn recompute_metrics(&self) -> Result<usize, CoreError> {
        let mut conn = self.conn.lock().expect("history mutex poisoned");
        let tx = conn.transaction()?;
        let keys: Vec<(String, String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT DISTINCT pattern, redundancy, design_goal FROM topology_records",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?;
            let mut keys = Vec::new();
            for row in rows {
                keys.push(row?);
            }
            keys
        };
        for (pattern, redundancy, goal) in &keys {
            Self::refresh_metric(&tx, pattern, redundancy, goal)?;
        }
        tx.commit()?;
        log::info!("recomputed {} performance metric keys", keys.len());
        Ok(keys.len())
    }

    fn refresh_metric_for_topology(tx: &Transaction<'_>, topology_id: i64) -> Result<(), CoreError> {
        let key: Option<(String, String, String)> = tx
            .query_row(
                "SELECT pattern, redundancy, design_goal FROM topology_records WHERE id = ?1",
                [topology_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        if let Some((pattern, redundancy, goal)) = key {
            Self::refresh_metric(tx, &pattern, &redundancy, &goal)?;
        }
        Ok(())
    }

    /// Recompute one aggregate key from base tables inside the caller's
    /// transaction.
    fn refresh_metric(
        tx: &Transaction<'_>,
        pattern: &str,
        redundancy: &str,
        goal: &str,
    ) -> Result<(), CoreError> {
        let sample_size: u32 = tx.query_row(
            "SELECT COUNT(*) FROM topology_records
              WHERE pattern = ?1 AND redundancy = ?2 AND design_goal = ?3",
            params![pattern, redundancy, goal],
            |row| row.get(0),
        )?;

        let validation: (f64, f64, f64, f64, u32, u32) = tx.query_row(
            "SELECT COALESCE(AVG(v.overall_score), 0),
                    COALESCE(AVG(v.redundancy_score), 0),
                    COALESCE(AVG(v.path_diversity_score), 0),
                    COALESCE(AVG(CASE WHEN v.spof_eliminated THEN 100.0 ELSE 0.0 END), 0),
                    COALESCE(SUM(CASE WHEN v.satisfied THEN 1 ELSE 0 END), 0),
                    COUNT(*)
               FROM validation_records v
               JOIN topology_records t ON t.id = v.topology_id
              WHERE t.pattern = ?1 AND t.redundancy = ?2 AND t.design_goal = ?3",
            params![pattern, redundancy, goal],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )?;
        let (avg_overall, avg_red, avg_pd, spof_rate, satisfied_count, validation_count) =
            validation;

        let avg_resilience: f64 = tx.query_row(
            "SELECT COALESCE(AVG(s.resilience_impact), 0)
               FROM simulation_records s
               JOIN topology_records t ON t.id = s.topology_id
              WHERE t.pattern = ?1 AND t.redundancy = ?2 AND t.design_goal = ?3",
            params![pattern, redundancy, goal],
            |row| row.get(0),
        )?;

        // Explicit feedback for this pattern under the same key, rescaled
        // from 1-5 stars to 0-100.
        let (feedback_sum, feedback_count): (f64, u32) = tx.query_row(
            "SELECT COALESCE(SUM((feedback - 1) * 25.0), 0), COUNT(*)
               FROM recommendation_records
              WHERE user_selected = ?1 AND redundancy = ?2 AND design_goal = ?3
                AND feedback >= 1",
            params![pattern, redundancy, goal],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let implicit_sum = f64::from(satisfied_count) * 100.0;
        let weight_total = f64::from(validation_count) + FEEDBACK_WEIGHT * f64::from(feedback_count);
        let satisfaction_rate = if weight_total > 0.0 {
            (implicit_sum + FEEDBACK_WEIGHT * feedback_sum) / weight_total
        } else {
            0.0
        };

        let confidence = 100.0 * (f64::from(sample_size) / 10.0).min(1.0);

        tx.execute(
            "INSERT INTO performance_metrics
                (pattern, redundancy, design_goal, sample_size, avg_overall,
                 avg_redundancy, avg_path_diversity, avg_resilience_impact,
                 spof_elimination_rate, satisfaction_rate, confidence, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(pattern, redundancy, design_goal) DO UPDATE SET
                 sample_size = excluded.sample_size,
                 avg_overall = excluded.avg_overall,
                 avg_redundancy = excluded.avg_redundancy,
                 avg_path_diversity = excluded.avg_path_diversity,
                 avg_resilience_impact = excluded.avg_resilience_impact,
                 spof_elimination_rate = excluded.spof_elimination_rate,
                 satisfaction_rate = excluded.satisfaction_rate,
                 confidence = excluded.confidence,
                 last_updated = excluded.last_updated",
            params![
                pattern,
                redundancy,
                goal,
                sample_size,
                avg_overall,
                avg_red,
                avg_pd,
                avg_resilience,
                spof_rate,
                satisfaction_rate,
                confidence,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Counts used by reports and tests: (topologies, validations,
    /// simulations, recommendations, optimizations).
    pub fn record_counts(&self) -> Result<(u32, u32, u32, u32, u32), CoreError> {
        let conn = self.conn.lock().expect("history mutex poisoned");
        let count = |table: &str| -> Result<u32, rusqlite::Error> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })
        };
        Ok((
            count("topology_records")?,
            count("validation_records")?,
            count("simulation_records")?,
            count("recommendation_records")?,
            count("optimization_records")?,
        ))
    }
}
