//! In-memory store for testing.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    store::SyncStore,
    types::{LocalProduct, NotificationLogEntry, RunClose, RunStatus, StoreStats, SyncRun},
};

/// In-memory store with no persistence, used in tests.
///
/// Writes can be made to fail on demand to exercise storage-error paths.
#[derive(Default)]
pub struct InMemorySyncStore {
    /// Insertion order is preserved so "most recent" is well defined.
    runs: Mutex<Vec<SyncRun>>,
    products: Mutex<HashMap<String, LocalProduct>>,
    notifications: Mutex<Vec<NotificationLogEntry>>,
    failing_products: Mutex<HashSet<String>>,
    fail_run_writes: AtomicBool,
}

impl InMemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert/update of this product fail.
    pub fn fail_product_writes(&self, external_id: impl Into<String>) {
        self.failing_products
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(external_id.into());
    }

    /// Make `insert_run` and `finish_run` fail until reset.
    pub fn set_fail_run_writes(&self, fail: bool) {
        self.fail_run_writes.store(fail, Ordering::SeqCst);
    }

    pub fn product_count(&self) -> usize {
        self.products
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn check_product_write(&self, external_id: &str) -> Result<()> {
        let failing = self
            .failing_products
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if failing.contains(external_id) {
            return Err(Error::message(format!(
                "simulated write failure for {external_id}"
            )));
        }
        Ok(())
    }

    fn check_run_write(&self) -> Result<()> {
        if self.fail_run_writes.load(Ordering::SeqCst) {
            return Err(Error::message("simulated ledger write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncStore for InMemorySyncStore {
    async fn insert_run(&self, run: &SyncRun) -> Result<()> {
        self.check_run_write()?;
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        runs.push(run.clone());
        Ok(())
    }

    async fn finish_run(&self, id: &str, close: &RunClose) -> Result<SyncRun> {
        self.check_run_write()?;
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let run = runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::run_not_found(id))?;
        run.close(close)?;
        Ok(run.clone())
    }

    async fn get_run(&self, id: &str) -> Result<Option<SyncRun>> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(runs.iter().find(|r| r.id == id).cloned())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let mut recent: Vec<SyncRun> = runs.iter().rev().cloned().collect();
        // Stable sort keeps insertion order for equal timestamps.
        recent.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn delete_runs_before(&self, cutoff_ms: u64) -> Result<u64> {
        let mut runs = self.runs.lock().unwrap_or_else(|e| e.into_inner());
        let before = runs.len();
        runs.retain(|r| r.created_at_ms >= cutoff_ms);
        Ok((before - runs.len()) as u64)
    }

    async fn find_product(&self, external_id: &str) -> Result<Option<LocalProduct>> {
        let products = self.products.lock().unwrap_or_else(|e| e.into_inner());
        Ok(products.get(external_id).cloned())
    }

    async fn insert_product(&self, product: &LocalProduct) -> Result<()> {
        self.check_product_write(&product.external_id)?;
        let mut products = self.products.lock().unwrap_or_else(|e| e.into_inner());
        if products.contains_key(&product.external_id) {
            return Err(Error::ProductExists {
                external_id: product.external_id.clone(),
            });
        }
        products.insert(product.external_id.clone(), product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &LocalProduct) -> Result<()> {
        self.check_product_write(&product.external_id)?;
        let mut products = self.products.lock().unwrap_or_else(|e| e.into_inner());
        let existing =
            products
                .get_mut(&product.external_id)
                .ok_or_else(|| Error::ProductNotFound {
                    external_id: product.external_id.clone(),
                })?;
        let created_at_ms = existing.created_at_ms;
        *existing = product.clone();
        existing.created_at_ms = created_at_ms;
        Ok(())
    }

    async fn low_stock_products(&self, threshold: i64, limit: usize) -> Result<Vec<LocalProduct>> {
        let products = self.products.lock().unwrap_or_else(|e| e.into_inner());
        let mut low: Vec<LocalProduct> = products
            .values()
            .filter(|p| p.quantity <= threshold)
            .cloned()
            .collect();
        low.sort_by(|a, b| {
            a.quantity
                .cmp(&b.quantity)
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        low.truncate(limit);
        Ok(low)
    }

    async fn stats(&self, low_stock_threshold: i64) -> Result<StoreStats> {
        let (total_products, low_stock_count) = {
            let products = self.products.lock().unwrap_or_else(|e| e.into_inner());
            let low = products
                .values()
                .filter(|p| p.quantity <= low_stock_threshold)
                .count();
            (products.len() as u64, low as u64)
        };
        let last_run = self.recent_runs(1).await?.into_iter().next();
        Ok(StoreStats {
            total_products,
            low_stock_count,
            last_run,
        })
    }

    async fn append_notification(&self, entry: &NotificationLogEntry) -> Result<()> {
        let mut log = self
            .notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        log.push(entry.clone());
        Ok(())
    }

    async fn recent_notifications(&self, limit: usize) -> Result<Vec<NotificationLogEntry>> {
        let log = self
            .notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        Ok(log.iter().rev().take(limit).cloned().collect())
    }

    async fn delete_notifications_before(&self, cutoff_ms: u64) -> Result<u64> {
        let mut log = self
            .notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let before = log.len();
        log.retain(|n| n.created_at_ms >= cutoff_ms);
        Ok((before - log.len()) as u64)
    }
}

impl InMemorySyncStore {
    /// Runs still in the pending state.
    pub fn pending_runs(&self) -> Vec<SyncRun> {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.status == RunStatus::Pending)
            .cloned()
            .collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{reconcile::SyncTally, types::SyncOperation},
    };

    fn product(id: &str, quantity: i64) -> LocalProduct {
        LocalProduct {
            external_id: id.into(),
            sku: None,
            title: format!("product {id}"),
            description: None,
            weight: None,
            quantity,
            price: Some(1.0),
            vendor: None,
            product_type: None,
            image_url: None,
            tags: None,
            status: "active".into(),
            last_synced_at_ms: 1000,
            created_at_ms: 1000,
        }
    }

    #[tokio::test]
    async fn finish_run_only_once() {
        let store = InMemorySyncStore::new();
        let run = SyncRun::pending(SyncOperation::Manual, 1000);
        store.insert_run(&run).await.unwrap();

        let closed = store
            .finish_run(&run.id, &RunClose::Completed {
                tally: SyncTally {
                    synced: 1,
                    updated: 0,
                    failed: 0,
                },
                duration_ms: 10,
            })
            .await
            .unwrap();
        assert_eq!(closed.status, RunStatus::Completed);

        let again = store
            .finish_run(&run.id, &RunClose::Failed {
                error: "late".into(),
                duration_ms: 11,
            })
            .await;
        assert!(matches!(again, Err(Error::RunNotPending { .. })));
        assert!(matches!(
            store.finish_run("missing", &RunClose::Failed {
                error: "x".into(),
                duration_ms: 0
            })
            .await,
            Err(Error::RunNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn update_keeps_created_at() {
        let store = InMemorySyncStore::new();
        store.insert_product(&product("1", 5)).await.unwrap();

        let mut changed = product("1", 9);
        changed.created_at_ms = 99_999;
        store.update_product(&changed).await.unwrap();

        let got = store.find_product("1").await.unwrap().unwrap();
        assert_eq!(got.quantity, 9);
        assert_eq!(got.created_at_ms, 1000);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemorySyncStore::new();
        store.insert_product(&product("1", 5)).await.unwrap();
        assert!(matches!(
            store.insert_product(&product("1", 5)).await,
            Err(Error::ProductExists { .. })
        ));
        assert_eq!(store.product_count(), 1);
    }

    #[tokio::test]
    async fn low_stock_sorted_and_limited() {
        let store = InMemorySyncStore::new();
        for (id, qty) in [("a", 50), ("b", 3), ("c", 0), ("d", 10), ("e", 7)] {
            store.insert_product(&product(id, qty)).await.unwrap();
        }
        let low = store.low_stock_products(10, 3).await.unwrap();
        let ids: Vec<_> = low.iter().map(|p| p.external_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "e"]);

        let stats = store.stats(10).await.unwrap();
        assert_eq!(stats.total_products, 5);
        assert_eq!(stats.low_stock_count, 4);
        assert!(stats.last_run.is_none());
    }

    #[tokio::test]
    async fn retention_deletes_only_old_rows() {
        let store = InMemorySyncStore::new();
        store
            .insert_run(&SyncRun::pending(SyncOperation::Scheduled, 100))
            .await
            .unwrap();
        store
            .insert_run(&SyncRun::pending(SyncOperation::Scheduled, 500))
            .await
            .unwrap();
        assert_eq!(store.delete_runs_before(200).await.unwrap(), 1);
        let left = store.recent_runs(10).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].created_at_ms, 500);
    }
}
