//! Error types for carbon-patterns crate.
//!
//! Pattern computation errors are recoverable whenever a previously cached
//! pattern exists; only a first-ever failure for a region reaches callers.

use thiserror::Error;

/// Errors raised by data collaborators.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The collaborator has no data for this region.
    #[error("region not found: {0}")]
    RegionNotFound(String),

    /// The collaborator could not be reached or refused the request.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The collaborator returned data that could not be interpreted.
    #[error("malformed source data: {0}")]
    Malformed(String),
}

/// Errors that can occur while computing or serving regional patterns.
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    /// Fewer samples than the configured analysis floor.
    #[error("insufficient data: {actual} samples, {required} required")]
    InsufficientData { actual: usize, required: usize },

    /// A historical or current-intensity fetch failed.
    #[error("fetch failed for region {region}: {reason}")]
    CollaboratorFetch { region: String, reason: SourceError },

    /// No cached pattern exists and the first computation failed.
    #[error("no pattern available for region {region}: {reason}")]
    NoPatternAvailable {
        region: String,
        reason: Box<PatternError>,
    },

    /// A refresh or computation exceeded its time budget.
    #[error("refresh for region {region} timed out after {timeout_ms}ms")]
    RefreshTimeout { region: String, timeout_ms: u64 },

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PatternError {
    /// Wrap a collaborator failure for `region`.
    pub fn fetch(region: impl Into<String>, reason: SourceError) -> Self {
        PatternError::CollaboratorFetch {
            region: region.into(),
            reason,
        }
    }

    /// The underlying cause, looking through `NoPatternAvailable`.
    pub fn root_cause(&self) -> &PatternError {
        match self {
            PatternError::NoPatternAvailable { reason, .. } => reason.root_cause(),
            other => other,
        }
    }

    /// Whether the root cause is a sample count below the floor.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self.root_cause(), PatternError::InsufficientData { .. })
    }
}

/// Result type for pattern operations.
pub type PatternResult<T> = Result<T, PatternError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_display() {
        let e = PatternError::InsufficientData {
            actual: 23,
            required: 24,
        };
        let msg = e.to_string();
        assert!(msg.contains("23"));
        assert!(msg.contains("24"));
    }

    #[test]
    fn test_root_cause_through_no_pattern() {
        let e = PatternError::NoPatternAvailable {
            region: "GB".into(),
            reason: Box::new(PatternError::InsufficientData {
                actual: 3,
                required: 24,
            }),
        };
        assert!(e.is_insufficient_data());
        assert!(e.to_string().contains("GB"));

        let fetch = PatternError::fetch("GB", SourceError::Unavailable("timeout".into()));
        assert!(!fetch.is_insufficient_data());
        assert!(fetch.to_string().contains("timeout"));
    }
}
