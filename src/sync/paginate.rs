use futures::stream::{self, Stream, TryStreamExt};

use crate::model::project::{ProjectItem, ProjectRef};
use crate::providers::ProjectBoard;

use super::SyncError;

/// Largest page the items connection accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Streams every item on the board, page by page, in the order the API
/// returns them.
///
/// Each call starts over from the first page. Pages are fetched lazily, one
/// at a time, and the stream ends after the page that reports no further
/// results. A failed fetch ends the stream with [`SyncError::PageFetch`].
pub fn project_items<'a>(
    board: &'a dyn ProjectBoard,
    project: &'a ProjectRef,
    page_size: u32,
) -> impl Stream<Item = Result<ProjectItem, SyncError>> + Send + 'a {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

    // `None` once the last page has been read; `Some(cursor)` otherwise.
    let start: Option<Option<String>> = Some(None);
    stream::try_unfold(start, move |state| async move {
        let Some(cursor) = state else {
            return Ok(None);
        };

        let page = board
            .fetch_items_page(project, cursor.as_deref(), page_size)
            .await
            .map_err(SyncError::PageFetch)?;
        tracing::debug!(
            items = page.items.len(),
            has_next_page = page.has_next_page,
            "fetched items page"
        );

        let next = if page.has_next_page {
            Some(Some(page.end_cursor.ok_or(SyncError::MissingCursor)?))
        } else {
            None
        };
        let items = stream::iter(page.items.into_iter().map(Ok::<_, SyncError>));
        Ok::<_, SyncError>(Some((items, next)))
    })
    .try_flatten()
}
