use std::collections::HashSet;
use std::sync::Arc;

use futures::TryStreamExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::model::project::{ProjectRef, UpdateCommand};
use crate::providers::ProjectBoard;

use super::diff::diff_item;
use super::fields::{match_fields, MatchedField, SUPPORTED_FIELDS};
use super::paginate::{project_items, MAX_PAGE_SIZE};
use super::SyncError;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub page_size: u32,
    /// Upper bound on field updates running at the same time.
    pub max_in_flight: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            max_in_flight: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTally {
    pub field_id: String,
    pub name: String,
    pub updates: usize,
}

/// Outcome of one synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub items_scanned: usize,
    /// Distinct items that received at least one update.
    pub items_updated: usize,
    /// One entry per managed field, in catalog order.
    pub fields: Vec<FieldTally>,
}

impl SyncReport {
    pub fn total_updates(&self) -> usize {
        self.fields.iter().map(|f| f.updates).sum()
    }

    pub fn updated_fields(&self) -> impl Iterator<Item = &FieldTally> {
        self.fields.iter().filter(|f| f.updates > 0)
    }

    fn log(&self) {
        info!(
            scanned = self.items_scanned,
            updates = self.total_updates(),
            "Updated {} items.",
            self.items_updated
        );
        for field in self.updated_fields() {
            info!("> {}: {}", field.name, field.updates);
        }
    }
}

/// Keeps the derived fields of one project board in line with the issues
/// and pull requests on it.
pub struct SyncOrchestrator {
    board: Arc<dyn ProjectBoard>,
    project: ProjectRef,
    options: SyncOptions,
}

impl SyncOrchestrator {
    pub fn new(board: Arc<dyn ProjectBoard>, project: ProjectRef, options: SyncOptions) -> Self {
        Self {
            board,
            project,
            options,
        }
    }

    /// Performs a full scan of the board and corrects every drifted field.
    ///
    /// All updates issued during the scan are awaited before returning, so a
    /// successful report means every correction was accepted.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let project_id = self
            .board
            .resolve_project_id(&self.project)
            .await
            .map_err(SyncError::ProjectLookup)?;
        let schema = self
            .board
            .fetch_field_schema(&self.project)
            .await
            .map_err(SyncError::SchemaFetch)?;

        let fields = match_fields(SUPPORTED_FIELDS, &schema);
        if fields.is_empty() {
            info!("No field to manage.");
            return Ok(SyncReport::default());
        }
        info!(
            project = %project_id,
            fields = ?fields.iter().map(|f| f.field.name.as_str()).collect::<Vec<_>>(),
            "Managing project fields on {} via {}",
            self.project.owner,
            self.board.name()
        );

        let mut tally = Tally::new(&fields);
        let mut pending = PendingUpdates::new(self.board.clone(), self.options.max_in_flight);

        let scanned = self
            .scan(&project_id, &fields, &mut tally, &mut pending)
            .await;
        let settled = pending.finish().await;
        if let (Err(_), Err(err)) = (&scanned, &settled) {
            warn!(%err, "field update failed after the scan stopped");
        }
        scanned?;
        settled?;

        let report = tally.into_report();
        report.log();
        Ok(report)
    }

    async fn scan(
        &self,
        project_id: &str,
        fields: &[MatchedField],
        tally: &mut Tally,
        pending: &mut PendingUpdates,
    ) -> Result<(), SyncError> {
        let items = project_items(self.board.as_ref(), &self.project, self.options.page_size);
        futures::pin_mut!(items);

        while let Some(item) = items.try_next().await? {
            tally.items_scanned += 1;
            for update in diff_item(project_id, &item, fields) {
                debug!(
                    item = %update.item_id,
                    field = %update.field_name,
                    value = ?update.input.value(),
                    "updating field"
                );
                tally.record(&update);
                pending.submit(update).await?;
            }
        }
        Ok(())
    }
}

struct Tally {
    items_scanned: usize,
    updated_items: HashSet<String>,
    fields: Vec<FieldTally>,
}

impl Tally {
    fn new(fields: &[MatchedField]) -> Self {
        Self {
            items_scanned: 0,
            updated_items: HashSet::new(),
            fields: fields
                .iter()
                .map(|m| FieldTally {
                    field_id: m.field.id.clone(),
                    name: m.field.name.clone(),
                    updates: 0,
                })
                .collect(),
        }
    }

    fn record(&mut self, update: &UpdateCommand) {
        self.updated_items.insert(update.item_id.clone());
        if let Some(field) = self
            .fields
            .iter_mut()
            .find(|f| f.field_id == update.field_id)
        {
            field.updates += 1;
        }
    }

    fn into_report(self) -> SyncReport {
        SyncReport {
            items_scanned: self.items_scanned,
            items_updated: self.updated_items.len(),
            fields: self.fields,
        }
    }
}

/// Field updates dispatched during the scan and not yet awaited.
struct PendingUpdates {
    board: Arc<dyn ProjectBoard>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<(), SyncError>>,
}

impl PendingUpdates {
    fn new(board: Arc<dyn ProjectBoard>, max_in_flight: usize) -> Self {
        Self {
            board,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            tasks: JoinSet::new(),
        }
    }

    /// Waits for a free slot, then spawns the update without waiting for it.
    /// Fails with the error of an earlier update if one has already finished
    /// unsuccessfully, in which case nothing is spawned.
    async fn submit(&mut self, update: UpdateCommand) -> Result<(), SyncError> {
        let permit = self.permits.clone().acquire_owned().await?;
        self.reap()?;

        let board = self.board.clone();
        self.tasks.spawn(async move {
            let _permit = permit;
            let outcome = board.update_item_field_value(&update).await;
            outcome.map_err(|cause| SyncError::Mutation {
                item_id: update.item_id,
                field: update.field_name,
                cause,
            })
        });
        Ok(())
    }

    fn reap(&mut self) -> Result<(), SyncError> {
        while let Some(joined) = self.tasks.try_join_next() {
            joined??;
        }
        Ok(())
    }

    /// Waits for every outstanding update and returns the first failure.
    async fn finish(mut self) -> Result<(), SyncError> {
        let mut first_error = None;
        while let Some(joined) = self.tasks.join_next().await {
            let Err(err) = joined.map_err(SyncError::from).and_then(|outcome| outcome) else {
                continue;
            };
            if first_error.is_none() {
                first_error = Some(err);
            } else {
                warn!(%err, "additional field update failed");
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
