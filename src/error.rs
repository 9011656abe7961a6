use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `voluntaria`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains. Note that most faults never
/// reach a caller: the dialogue layer converts everything into a spoken
/// response at the turn boundary.
#[derive(Debug, Error)]
pub enum VoluntariaError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Catalog ─────────────────────────────────────────────────────────
    #[error("catalog: {0}")]
    Catalog(#[from] CatalogError),

    // ── Slots ───────────────────────────────────────────────────────────
    #[error("slot: {0}")]
    Slot(#[from] SlotError),

    // ── Scheduling ──────────────────────────────────────────────────────
    #[error("schedule: {0}")]
    Schedule(#[from] ScheduleError),

    // ── Submission / Transport ──────────────────────────────────────────
    #[error("submission: {0}")]
    Submission(#[from] SubmissionError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Catalog errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown subprogram id: {0}")]
    UnknownService(String),

    #[error("subprogram {0} is not offered")]
    DisabledService(String),
}

// ─── Slot errors ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("slot {name} missing from turn")]
    Missing { name: String },

    #[error("slot {name}: cannot parse {value:?} as {expected}")]
    Parse {
        name: String,
        value: String,
        expected: &'static str,
    },
}

// ─── Scheduling errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid duration literal: {0:?}")]
    BadDuration(String),

    #[error("recurrence window rejected: {0}")]
    InvalidWindow(crate::scheduling::WindowViolation),

    #[error("no weekday rules to expand")]
    NoRules,
}

// ─── Submission errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("session is missing a {0} before submission")]
    IncompleteState(&'static str),

    #[error("backend timed out after {0} ms")]
    Timeout(u64),

    #[error("backend rejected the request: {0}")]
    Rejected(String),

    #[error("transport: {0}")]
    Transport(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, VoluntariaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_error_displays_id() {
        let err = VoluntariaError::Catalog(CatalogError::DisabledService("65099".into()));
        assert!(err.to_string().contains("65099"));
    }

    #[test]
    fn slot_parse_error_displays_expectation() {
        let err = VoluntariaError::Slot(SlotError::Parse {
            name: "starttime".into(),
            value: "soon".into(),
            expected: "HH:MM time",
        });
        assert!(err.to_string().contains("starttime"));
        assert!(err.to_string().contains("HH:MM"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let err: VoluntariaError = anyhow_err.into();
        assert!(err.to_string().contains("something went wrong"));
    }

    #[test]
    fn timeout_displays_millis() {
        let err = VoluntariaError::Submission(SubmissionError::Timeout(6000));
        assert!(err.to_string().contains("6000"));
    }
}
