pub mod github;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::model::project::{ItemsPage, ProjectRef, SchemaField, UpdateCommand};

/// Remote store holding the project board.
#[async_trait]
pub trait ProjectBoard: Send + Sync {
    fn name(&self) -> &str;
    /// Fails when the owner or the project does not exist.
    async fn resolve_project_id(&self, project: &ProjectRef) -> Result<String>;
    /// The board's configured fields (first 100).
    async fn fetch_field_schema(&self, project: &ProjectRef) -> Result<Vec<SchemaField>>;
    async fn fetch_items_page(
        &self,
        project: &ProjectRef,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<ItemsPage>;
    async fn update_item_field_value(&self, update: &UpdateCommand) -> Result<()>;
}

#[cfg(test)]
pub mod tests;

pub fn create_board(config: &AppConfig) -> Result<Arc<dyn ProjectBoard>> {
    let client = github::GitHubClient::new(&config.github)?;
    Ok(Arc::new(client))
}
