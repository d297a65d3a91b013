//! Error taxonomy shared by every component of the migrator.

/// The error type returned by the outbound ports (legacy readers, canonical store, directories).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while migrating a legacy challenge.
///
/// The builder and the resolver raise these; the orchestrator is the only place that turns
/// them into ledger entries.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The legacy record can't be expressed in the canonical schema (unmappable track/subtrack,
    /// unresolved timeline template, unknown term). Never retried automatically.
    #[error("Validation error: {0}")]
    Validation(String),
    /// A required reference is missing from an external directory or catalog.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A read or write against an external store failed.
    #[error("Transient error: {0}")]
    Transient(#[from] BoxError),
    /// A run was requested while another one is in flight.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl MigrationError {
    /// Wraps any error coming from a collaborator as a transient failure.
    pub fn transient<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transient(Box::new(err))
    }

    /// Returns true for [`MigrationError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct ConnectionReset;

    #[test]
    fn boxed_errors_convert_to_transient() {
        let boxed: BoxError = Box::new(ConnectionReset);
        let err: MigrationError = boxed.into();
        assert!(matches!(err, MigrationError::Transient(_)));
        assert_eq!(err.to_string(), "Transient error: connection reset");
    }

    #[test]
    fn transient_helper_keeps_the_source() {
        let err = MigrationError::transient(ConnectionReset);
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("connection reset"));
    }

    #[test]
    fn conflict_is_detected() {
        assert!(MigrationError::Conflict("running".into()).is_conflict());
        assert!(!MigrationError::Validation("bad".into()).is_conflict());
    }
}
