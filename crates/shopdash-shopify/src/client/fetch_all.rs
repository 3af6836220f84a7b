//! Multi-page fetch loop for `ShopifyClient`.

use serde_json::Value;

use crate::error::ShopifyError;

use super::{Resource, ShopCredentials, ShopifyClient, MAX_PAGES};

impl ShopifyClient {
    /// Fetches every record of `resource`, following `page_info` cursors
    /// until no `rel="next"` link remains.
    ///
    /// All-or-nothing: a failed page discards what earlier pages returned.
    /// Callers that want to process records page by page should drive
    /// [`Self::fetch_page`] themselves.
    ///
    /// # Errors
    ///
    /// Propagates any error from [`Self::fetch_page`], and returns
    /// [`ShopifyError::PaginationLimit`] past [`MAX_PAGES`] pages.
    pub async fn fetch_all(
        &self,
        shop: ShopCredentials<'_>,
        resource: &Resource,
        limit: u32,
    ) -> Result<Vec<Value>, ShopifyError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            page_count += 1;
            if page_count > MAX_PAGES {
                return Err(ShopifyError::PaginationLimit {
                    resource: resource.collection.to_owned(),
                    max_pages: MAX_PAGES,
                });
            }

            let page = self
                .fetch_page(shop, resource, limit, cursor.as_deref())
                .await?;
            records.extend(page.records);

            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        Ok(records)
    }
}
