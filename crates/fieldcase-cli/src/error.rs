use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fieldcase_core::Error),
    #[error(transparent)]
    Sync(#[from] fieldcase_core::sync::SyncError),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note text provided")]
    EmptyNoteText,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Sync is not configured. Set FIELDCASE_API_URL and FIELDCASE_API_TOKEN, or pass --offline for local-only commands."
    )]
    SyncNotConfigured,
}
