//! Run and low-stock notifications.
//!
//! Notifications are best-effort: every failure is folded into a
//! [`NotifyOutcome`] for the caller to log, and nothing here is allowed to
//! change the outcome of a sync run.

use std::sync::Arc;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    shelfsync_common::time::now_ms,
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    store::SyncStore,
    types::{LocalProduct, NotificationKind, NotificationLogEntry, RunStatus, SyncRun},
};

/// Low-stock reports never list more than this many products.
pub const LOW_STOCK_REPORT_LIMIT: usize = 20;

/// Result of one notification attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NotifyOutcome {
    #[must_use]
    pub fn sent(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Report the terminal state of a run.
    async fn send_run_report(&self, run_id: &str) -> NotifyOutcome;

    /// Report products with `quantity <= threshold`.
    async fn send_low_stock_report(&self, threshold: i64) -> NotifyOutcome;
}

/// Accepts everything and sends nothing.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_run_report(&self, _run_id: &str) -> NotifyOutcome {
        NotifyOutcome::sent("notifications disabled")
    }

    async fn send_low_stock_report(&self, _threshold: i64) -> NotifyOutcome {
        NotifyOutcome::sent("notifications disabled")
    }
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
}

/// Transport that actually hands a notification to someone.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Emits notifications through `tracing`.
pub struct LogDelivery;

#[async_trait]
impl Delivery for LogDelivery {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(
            kind = notification.kind.as_str(),
            subject = %notification.subject,
            body = %notification.body,
            "notification"
        );
        Ok(())
    }
}

/// Builds reports from the store, delivers them, and records every attempt in
/// the notification log.
pub struct LedgerNotifier {
    store: Arc<dyn SyncStore>,
    delivery: Arc<dyn Delivery>,
}

impl LedgerNotifier {
    pub fn new(store: Arc<dyn SyncStore>, delivery: Arc<dyn Delivery>) -> Self {
        Self { store, delivery }
    }

    /// Notifier that logs reports instead of sending them anywhere.
    pub fn logging(store: Arc<dyn SyncStore>) -> Self {
        Self::new(store, Arc::new(LogDelivery))
    }

    async fn dispatch(&self, notification: Notification) -> NotifyOutcome {
        let delivered = self.delivery.deliver(&notification).await;
        let entry = NotificationLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            kind: notification.kind,
            subject: notification.subject,
            body: notification.body,
            sent: delivered.is_ok(),
            error_message: delivered.as_ref().err().map(ToString::to_string),
            created_at_ms: now_ms(),
        };
        if let Err(e) = self.store.append_notification(&entry).await {
            warn!(error = %e, kind = entry.kind.as_str(), "failed to record notification");
        }

        match delivered {
            Ok(()) => {
                debug!(
                    kind = entry.kind.as_str(),
                    subject = %entry.subject,
                    "notification delivered"
                );
                NotifyOutcome::sent(format!("{} delivered", entry.kind.as_str()))
            },
            Err(e) => NotifyOutcome::failed(e.to_string()),
        }
    }
}

#[async_trait]
impl Notifier for LedgerNotifier {
    async fn send_run_report(&self, run_id: &str) -> NotifyOutcome {
        let run = match self.store.get_run(run_id).await {
            Ok(Some(run)) => run,
            Ok(None) => return NotifyOutcome::failed(Error::run_not_found(run_id).to_string()),
            Err(e) => return NotifyOutcome::failed(e.to_string()),
        };
        self.dispatch(run_report(&run)).await
    }

    async fn send_low_stock_report(&self, threshold: i64) -> NotifyOutcome {
        let products = match self
            .store
            .low_stock_products(threshold, LOW_STOCK_REPORT_LIMIT)
            .await
        {
            Ok(products) => products,
            Err(e) => return NotifyOutcome::failed(e.to_string()),
        };
        if products.is_empty() {
            return NotifyOutcome::sent("nothing to report");
        }
        self.dispatch(low_stock_report(threshold, &products)).await
    }
}

fn run_report(run: &SyncRun) -> Notification {
    let mut body = format!(
        "Run:       {}\nOperation: {}\nStatus:    {}\nItems:     {}\n",
        run.id, run.operation, run.status, run.item_count
    );
    if let Some(tally) = run.metadata {
        body.push_str(&format!(
            "Created:   {}\nUpdated:   {}\nFailed:    {}\n",
            tally.synced, tally.updated, tally.failed
        ));
    }
    if let Some(ms) = run.duration_ms {
        body.push_str(&format!("Duration:  {ms} ms\n"));
    }
    if run.status == RunStatus::Failed
        && let Some(err) = &run.error_message
    {
        body.push_str(&format!("Error:     {err}\n"));
    }

    Notification {
        kind: NotificationKind::SyncReport,
        subject: format!(
            "Sync report - {} {}",
            run.operation,
            run.status.as_str().to_uppercase()
        ),
        body,
    }
}

fn low_stock_report(threshold: i64, products: &[LocalProduct]) -> Notification {
    let mut body = format!(
        "{} products at or below {threshold} units:\n\n",
        products.len()
    );
    for p in products {
        let price = p.price.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
        body.push_str(&format!(
            "- {} (SKU {}): qty {}, price {}, vendor {}\n",
            p.title,
            p.sku.as_deref().unwrap_or("n/a"),
            p.quantity,
            price,
            p.vendor.as_deref().unwrap_or("n/a"),
        ));
    }

    Notification {
        kind: NotificationKind::LowStock,
        subject: format!(
            "Low stock alert - {} items need restocking",
            products.len()
        ),
        body,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        super::*,
        crate::{
            reconcile::SyncTally,
            store_memory::InMemorySyncStore,
            types::{RunClose, SyncOperation},
        },
    };

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Delivery for Recording {
        async fn deliver(&self, notification: &Notification) -> Result<()> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Delivery for Broken {
        async fn deliver(&self, _notification: &Notification) -> Result<()> {
            Err(Error::Notify {
                message: "relay refused connection".into(),
            })
        }
    }

    fn product(id: &str, quantity: i64) -> LocalProduct {
        LocalProduct {
            external_id: id.into(),
            sku: None,
            title: format!("Product {id}"),
            description: None,
            weight: None,
            quantity,
            price: Some(4.0),
            vendor: None,
            product_type: None,
            image_url: None,
            tags: None,
            status: "active".into(),
            last_synced_at_ms: 1,
            created_at_ms: 1,
        }
    }

    #[tokio::test]
    async fn run_report_is_delivered_and_logged() {
        let store = Arc::new(InMemorySyncStore::new());
        let delivery = Arc::new(Recording::default());
        let notifier = LedgerNotifier::new(store.clone(), delivery.clone());

        let run = SyncRun::pending(SyncOperation::Manual, 1);
        store.insert_run(&run).await.unwrap();
        store
            .finish_run(&run.id, &RunClose::Completed {
                tally: SyncTally {
                    synced: 2,
                    updated: 3,
                    failed: 1,
                },
                duration_ms: 12,
            })
            .await
            .unwrap();

        let outcome = notifier.send_run_report(&run.id).await;
        assert!(outcome.success);

        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent[0].subject, "Sync report - manual COMPLETED");
        assert!(sent[0].body.contains("Failed:    1"));

        let log = store.recent_notifications(10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].sent);
        assert_eq!(log[0].kind, NotificationKind::SyncReport);
    }

    #[tokio::test]
    async fn failed_run_report_includes_error() {
        let store = Arc::new(InMemorySyncStore::new());
        let delivery = Arc::new(Recording::default());
        let notifier = LedgerNotifier::new(store.clone(), delivery.clone());

        let run = SyncRun::pending(SyncOperation::Scheduled, 1);
        store.insert_run(&run).await.unwrap();
        store
            .finish_run(&run.id, &RunClose::Failed {
                error: "catalog rejected request (401)".into(),
                duration_ms: 2,
            })
            .await
            .unwrap();

        assert!(notifier.send_run_report(&run.id).await.success);
        let sent = delivery.sent.lock().unwrap();
        assert!(sent[0].subject.ends_with("FAILED"));
        assert!(sent[0].body.contains("catalog rejected request (401)"));
    }

    #[tokio::test]
    async fn unknown_run_is_a_failed_outcome() {
        let store = Arc::new(InMemorySyncStore::new());
        let notifier = LedgerNotifier::logging(store.clone());
        let outcome = notifier.send_run_report("nope").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("nope"));
        assert!(store.recent_notifications(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_is_recorded() {
        let store = Arc::new(InMemorySyncStore::new());
        store.insert_product(&product("1", 2)).await.unwrap();
        let notifier = LedgerNotifier::new(store.clone(), Arc::new(Broken));

        let outcome = notifier.send_low_stock_report(10).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("relay refused"));

        let log = store.recent_notifications(10).await.unwrap();
        assert!(!log[0].sent);
        assert!(log[0].error_message.is_some());
    }

    #[tokio::test]
    async fn low_stock_lists_lowest_first() {
        let store = Arc::new(InMemorySyncStore::new());
        for (id, qty) in [("a", 9), ("b", 1), ("c", 40)] {
            store.insert_product(&product(id, qty)).await.unwrap();
        }
        let delivery = Arc::new(Recording::default());
        let notifier = LedgerNotifier::new(store, delivery.clone());

        assert!(notifier.send_low_stock_report(10).await.success);
        let sent = delivery.sent.lock().unwrap();
        assert_eq!(sent[0].subject, "Low stock alert - 2 items need restocking");
        let b = sent[0].body.find("Product b").unwrap();
        let a = sent[0].body.find("Product a").unwrap();
        assert!(b < a);
        assert!(!sent[0].body.contains("Product c"));
    }

    #[tokio::test]
    async fn nothing_low_is_success_without_delivery() {
        let store = Arc::new(InMemorySyncStore::new());
        store.insert_product(&product("a", 50)).await.unwrap();
        let delivery = Arc::new(Recording::default());
        let notifier = LedgerNotifier::new(store.clone(), delivery.clone());

        let outcome = notifier.send_low_stock_report(10).await;
        assert!(outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("nothing to report"));
        assert!(delivery.sent.lock().unwrap().is_empty());
        assert!(store.recent_notifications(10).await.unwrap().is_empty());
    }
}
