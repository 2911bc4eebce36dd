//! Error taxonomy for the topology engine.
//!
//! Every error that crosses a component boundary is a typed discriminant
//! with a stable textual label. The orchestrator converts these into
//! per-stage status entries; user-visible messages name the stage, the
//! error kind, and a minimal corrective hint.

use thiserror::Error;

/// Transport-agnostic error kinds shared across the pipeline.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An intent field is outside its domain. Surfaced to the caller,
    /// never logged as an internal error.
    #[error("invalid intent: {reason} (hint: {hint})")]
    InvalidIntent { reason: String, hint: String },

    /// The requested pattern plus redundancy target cannot be met within
    /// the pattern's structural ceiling. The caller may loosen constraints.
    #[error("unsatisfiable: {pattern} cannot provide {target} edge-disjoint paths (hint: {hint})")]
    Unsatisfiable {
        pattern: String,
        target: u32,
        hint: String,
    },

    /// Hub-spoke with SPOF minimization but no redundancy budget for a
    /// secondary hub.
    #[error("spof unavoidable: hub-spoke with minimize_spof requires redundancy >= standard")]
    SpofUnavoidable,

    /// The link address pool ran dry. Fatal for the pipeline.
    #[error("address space exhausted: no /30 subnets left in {pool}")]
    AddressSpaceExhausted { pool: String },

    /// A pipeline stage exceeded its deadline.
    #[error("stage timeout: {stage} exceeded {deadline_ms}ms")]
    StageTimeout { stage: String, deadline_ms: u64 },

    /// History store I/O failure. Logged; the pipeline still returns a
    /// report flagged as partially persisted.
    #[error("persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// A failure scenario referenced a device or link that does not exist.
    #[error("invalid scenario: {reason}")]
    InvalidScenario { reason: String },

    /// Cooperative cancellation at a stage boundary.
    #[error("cancelled before stage {stage}")]
    Cancelled { stage: String },
}

impl CoreError {
    /// Stable label used in reports and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidIntent { .. } => "invalid_intent",
            CoreError::Unsatisfiable { .. } => "unsatisfiable",
            CoreError::SpofUnavoidable => "spof_unavoidable",
            CoreError::AddressSpaceExhausted { .. } => "address_space_exhausted",
            CoreError::StageTimeout { .. } => "stage_timeout",
            CoreError::Persistence(_) => "persistence_error",
            CoreError::InvalidScenario { .. } => "invalid_scenario",
            CoreError::Cancelled { .. } => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_labels() {
        let err = CoreError::InvalidIntent {
            reason: "site_count 1 below minimum".into(),
            hint: "raise site_count to at least 2".into(),
        };
        assert_eq!(err.kind(), "invalid_intent");

        let err = CoreError::Unsatisfiable {
            pattern: "ring".into(),
            target: 4,
            hint: "lower redundancy or choose full-mesh".into(),
        };
        assert_eq!(err.kind(), "unsatisfiable");
        assert!(err.to_string().contains("ring"));
        assert!(err.to_string().contains("4"));
    }

    #[test]
    fn messages_carry_corrective_hints() {
        let err = CoreError::InvalidIntent {
            reason: "max_hops must be positive".into(),
            hint: "increase max_hops".into(),
        };
        assert!(err.to_string().contains("increase max_hops"));
    }

    #[test]
    fn persistence_errors_wrap_sqlite() {
        let err = CoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(err.kind(), "persistence_error");
        assert!(err.to_string().starts_with("persistence error"));
    }

    #[test]
    fn stage_errors_name_the_stage() {
        let err = CoreError::StageTimeout {
            stage: "synthesize".into(),
            deadline_ms: 30_000,
        };
        assert!(err.to_string().contains("synthesize"));

        let err = CoreError::Cancelled {
            stage: "validate".into(),
        };
        assert_eq!(err.kind(), "cancelled");
        assert!(err.to_string().contains("validate"));
    }
}
