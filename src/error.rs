// =====================================================
// PIPELINE ERRORS
// =====================================================

//! Error taxonomy for the load pipeline.
//!
//! - **Configuration**: config file, queries file or run flag unusable.
//!   Fatal before any table is processed.
//! - **Schema**: destination table or its columns not found, or no
//!   destination could be derived from a statement. Fatal for the whole
//!   extraction run.
//! - **Transport**: source or destination statement/connection failures.
//! - **Notification**: only ever logged, never returned from a stage.
//!
//! Coercion has no error variant; every conversion has a fallback value.

/// Primary error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The destination catalog returned no columns for the identifier.
    #[error("columns not found for {0}")]
    NotFound(String),

    #[error("no destination table could be derived from statement: {0}")]
    UnresolvedDestination(String),

    #[error("source database error: {0}")]
    Source(String),

    #[error("destination database error: {0}")]
    Destination(String),

    #[error("run flag error: {0}")]
    RunFlag(String),

    #[error("notification failed: {0}")]
    Notification(String),
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::NotFound(_) | Self::UnresolvedDestination(_) => "schema",
            Self::Source(_) | Self::Destination(_) => "transport",
            Self::RunFlag(_) => "run_flag",
            Self::Notification(_) => "notification",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
