pub mod diff;
pub mod extract;
pub mod fields;
pub mod orchestrator;
pub mod paginate;

use thiserror::Error;

/// Reasons a synchronization run is aborted.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to resolve project: {0:#}")]
    ProjectLookup(anyhow::Error),
    #[error("failed to fetch project fields: {0:#}")]
    SchemaFetch(anyhow::Error),
    #[error("failed to fetch project items: {0:#}")]
    PageFetch(anyhow::Error),
    #[error("failed to update field '{field}' of item {item_id}: {cause:#}")]
    Mutation {
        item_id: String,
        field: String,
        cause: anyhow::Error,
    },
    #[error("items page reported more results without an end cursor")]
    MissingCursor,
    #[error("update task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("update slots were closed")]
    Slots(#[from] tokio::sync::AcquireError),
}
