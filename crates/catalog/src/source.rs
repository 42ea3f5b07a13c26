//! The seam between the sync engine and wherever product listings come from.

use {async_trait::async_trait, tracing::debug};

use crate::{Result, types::RemoteProduct};

/// A paginated product catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Page size used by [`CatalogSource::fetch_all`].
    fn page_size(&self) -> u32;

    /// Fetch one page. Pages are numbered from 1; an empty page means the
    /// catalog is exhausted.
    async fn fetch_page(&self, page_size: u32, page: u32) -> Result<Vec<RemoteProduct>>;

    /// Fetch every page in order until an empty one comes back.
    ///
    /// Any page error aborts the whole fetch: skipping a page would silently
    /// drop products from the run.
    async fn fetch_all(&self) -> Result<Vec<RemoteProduct>> {
        let page_size = self.page_size();
        let mut products = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.fetch_page(page_size, page).await?;
            if batch.is_empty() {
                break;
            }
            debug!(page, count = batch.len(), "fetched catalog page");
            products.extend(batch);
            page += 1;
        }
        debug!(pages = page, total = products.len(), "catalog fetch complete");
        Ok(products)
    }
}
