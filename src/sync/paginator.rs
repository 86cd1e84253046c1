//! Draining offset-paged collections

use std::future::Future;

use crate::model::Page;

/// Fetch every page of a collection and return the items in service order.
///
/// `fetch_page` is called with the offset of the next unseen entry, which
/// advances by each page's `fetched` count rather than by the items kept from
/// it. Draining stops once the offset reaches the most recently reported
/// total, or when the service returns no entries at all, which keeps a stale
/// total from looping forever. The first failing page aborts the whole drain.
pub async fn drain<T, E, F, Fut>(mut fetch_page: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    let mut items = Vec::new();
    let mut offset: u32 = 0;

    loop {
        let page = fetch_page(offset).await?;
        if page.fetched == 0 {
            break;
        }

        offset += page.fetched;
        items.extend(page.items);

        if offset >= page.total {
            break;
        }
    }

    tracing::trace!(count = items.len(), "Drained paged collection");
    Ok(items)
}
