use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use super::ProjectBoard;
use crate::model::project::{
    FieldInput, FieldValue, ItemsPage, OwnerType, ProjectItem, ProjectRef, SchemaField,
    UpdateCommand,
};

/// In-memory board that records every call made against it.
pub struct FakeBoard {
    schema: Vec<SchemaField>,
    pages: Mutex<Vec<ItemsPage>>,
    cursors: Mutex<Vec<Option<String>>>,
    page_sizes: Mutex<Vec<u32>>,
    updates: Mutex<Vec<UpdateCommand>>,
    update_calls: Mutex<usize>,
    update_delay: Option<Duration>,
    failing_page: Option<usize>,
    failing_schema: bool,
    failing_item: Option<String>,
    apply_updates: bool,
}

impl FakeBoard {
    pub fn new(schema: Vec<SchemaField>) -> Self {
        Self {
            schema,
            pages: Mutex::new(Vec::new()),
            cursors: Mutex::new(Vec::new()),
            page_sizes: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            update_calls: Mutex::new(0),
            update_delay: None,
            failing_page: None,
            failing_schema: false,
            failing_item: None,
            apply_updates: false,
        }
    }

    pub fn with_pages(self, pages: Vec<ItemsPage>) -> Self {
        *self.pages.lock().unwrap() = pages;
        self
    }

    /// Fails the fetch of the page at `index` (zero-based).
    pub fn failing_page(mut self, index: usize) -> Self {
        self.failing_page = Some(index);
        self
    }

    pub fn failing_schema(mut self) -> Self {
        self.failing_schema = true;
        self
    }

    pub fn failing_updates_for(mut self, item_id: &str) -> Self {
        self.failing_item = Some(item_id.to_string());
        self
    }

    /// Makes every update take `delay` before it succeeds or fails.
    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay = Some(delay);
        self
    }

    /// Writes accepted updates back into the stored items, so a later scan
    /// observes them.
    pub fn applying_updates(mut self) -> Self {
        self.apply_updates = true;
        self
    }

    pub fn cursors(&self) -> Vec<Option<String>> {
        self.cursors.lock().unwrap().clone()
    }

    pub fn page_sizes(&self) -> Vec<u32> {
        self.page_sizes.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<UpdateCommand> {
        self.updates.lock().unwrap().clone()
    }

    /// Update attempts, failed ones included.
    pub fn update_calls(&self) -> usize {
        *self.update_calls.lock().unwrap()
    }

    fn apply(&self, update: &UpdateCommand) {
        let Some(field) = self.schema.iter().find(|f| f.id == update.field_id) else {
            return;
        };
        let mut pages = self.pages.lock().unwrap();
        let Some(item) = pages
            .iter_mut()
            .flat_map(|p| p.items.iter_mut())
            .find(|i| i.id == update.item_id)
        else {
            return;
        };

        item.field_values
            .retain(|v| v.field().map_or(true, |f| f.id != update.field_id));
        let value = match &update.input {
            FieldInput::Date(None) | FieldInput::Text(None) => return,
            FieldInput::Date(date) => FieldValue::Date {
                date: date.clone(),
                field: Some(field.clone()),
            },
            FieldInput::Text(text) => FieldValue::Text {
                text: text.clone(),
                field: Some(field.clone()),
            },
        };
        item.field_values.push(value);
    }
}

#[async_trait]
impl ProjectBoard for FakeBoard {
    fn name(&self) -> &str {
        "fake"
    }

    async fn resolve_project_id(&self, _project: &ProjectRef) -> Result<String> {
        Ok("PVT_fake".into())
    }

    async fn fetch_field_schema(&self, _project: &ProjectRef) -> Result<Vec<SchemaField>> {
        if self.failing_schema {
            anyhow::bail!("Mock schema failure");
        }
        Ok(self.schema.clone())
    }

    async fn fetch_items_page(
        &self,
        _project: &ProjectRef,
        cursor: Option<&str>,
        page_size: u32,
    ) -> Result<ItemsPage> {
        self.cursors.lock().unwrap().push(cursor.map(String::from));
        self.page_sizes.lock().unwrap().push(page_size);

        let pages = self.pages.lock().unwrap();
        // The page after the one whose end cursor was handed back.
        let index = match cursor {
            None => 0,
            Some(cursor) => pages
                .iter()
                .position(|p| p.end_cursor.as_deref() == Some(cursor))
                .map_or(pages.len(), |i| i + 1),
        };

        if self.failing_page == Some(index) {
            anyhow::bail!("Mock page failure");
        }
        pages
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no page after cursor {cursor:?}"))
    }

    async fn update_item_field_value(&self, update: &UpdateCommand) -> Result<()> {
        *self.update_calls.lock().unwrap() += 1;
        if let Some(delay) = self.update_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_item.as_deref() == Some(update.item_id.as_str()) {
            anyhow::bail!("Mock update failure");
        }
        self.updates.lock().unwrap().push(update.clone());
        if self.apply_updates {
            self.apply(update);
        }
        Ok(())
    }
}

pub fn project_ref() -> ProjectRef {
    ProjectRef {
        owner: "mdn".into(),
        number: 1,
        owner_type: OwnerType::Organization,
    }
}

pub fn bare_item(id: &str) -> ProjectItem {
    ProjectItem {
        id: id.to_string(),
        content: None,
        field_values: vec![],
    }
}

#[tokio::test]
async fn fake_board_serves_pages_by_cursor() {
    let board = FakeBoard::new(vec![]).with_pages(vec![
        ItemsPage {
            items: vec![bare_item("a")],
            end_cursor: Some("c1".into()),
            has_next_page: true,
        },
        ItemsPage {
            items: vec![bare_item("b")],
            end_cursor: None,
            has_next_page: false,
        },
    ]);
    let project = project_ref();

    let first = board.fetch_items_page(&project, None, 100).await.unwrap();
    let second = board.fetch_items_page(&project, Some("c1"), 100).await.unwrap();
    let again = board.fetch_items_page(&project, None, 100).await.unwrap();
    assert_eq!(first.items[0].id, "a");
    assert_eq!(second.items[0].id, "b");
    assert_eq!(again.items[0].id, "a");
    assert!(board.fetch_items_page(&project, Some("zz"), 100).await.is_err());
    assert_eq!(board.cursors().len(), 4);
}

#[tokio::test]
async fn update_errors_propagate() {
    let board = FakeBoard::new(vec![]).failing_updates_for("I1");
    let update = UpdateCommand {
        project_id: "PVT_fake".into(),
        item_id: "I1".into(),
        field_id: "F1".into(),
        field_name: "Created By".into(),
        input: FieldInput::Text(Some("alice".into())),
    };

    let result = board.update_item_field_value(&update).await;
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Mock update failure"));
    assert!(board.updates().is_empty());
    assert_eq!(board.update_calls(), 1);
}

#[tokio::test]
async fn boards_work_behind_a_trait_object() {
    let board: Arc<dyn ProjectBoard> = Arc::new(FakeBoard::new(vec![SchemaField {
        id: "F1".into(),
        name: "Created At".into(),
        data_type: "DATE".into(),
    }]));

    assert_eq!(board.name(), "fake");
    let schema = board.fetch_field_schema(&project_ref()).await.unwrap();
    assert_eq!(schema.len(), 1);
}
