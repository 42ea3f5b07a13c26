//! Per-record reconciliation of remote listings against the local mirror.
//!
//! Every record is handled on its own: a failure is tagged and counted, never
//! propagated, and nothing is batched into a transaction.

use {
    futures::stream::{self, StreamExt},
    serde::{Deserialize, Serialize},
    shelfsync_catalog::{ProductListing, RemoteProduct},
    shelfsync_common::time::now_ms,
    tracing::{debug, warn},
};

use crate::{Error, store::SyncStore, types::LocalProduct};

/// Counts for one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTally {
    pub synced: u64,
    pub updated: u64,
    pub failed: u64,
}

impl SyncTally {
    /// Records that made it into storage.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.synced + self.updated
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.item_count() + self.failed
    }

    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            Ok(Upsert::Created) => self.synced += 1,
            Ok(Upsert::Updated) => self.updated += 1,
            Err(_) => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed record {}: {reason}", .external_id.as_deref().unwrap_or("<no id>"))]
    Malformed {
        external_id: Option<String>,
        reason: String,
    },

    #[error("failed to store product {external_id}: {source}")]
    Storage {
        external_id: String,
        #[source]
        source: Error,
    },
}

impl RecordError {
    fn malformed(record: &RemoteProduct, reason: impl Into<String>) -> Self {
        Self::Malformed {
            external_id: record.external_id(),
            reason: reason.into(),
        }
    }
}

pub type RecordOutcome = Result<Upsert, RecordError>;

/// Map a remote listing onto the local product shape.
///
/// The first variant carries price, quantity, SKU and weight; listings with no
/// variants use a zero-valued placeholder.
pub fn normalize(record: &RemoteProduct, now_ms: u64) -> Result<LocalProduct, RecordError> {
    let listing: ProductListing = record
        .decode()
        .map_err(|e| RecordError::malformed(record, e.to_string()))?;

    let title = listing.title.trim();
    if title.is_empty() {
        return Err(RecordError::malformed(record, "title is blank"));
    }

    let variant = listing.primary_variant();
    // A price that is not a number is stored as unknown; the product is kept.
    let price = non_empty(variant.price.as_deref()).and_then(|raw| {
        match raw.parse::<f64>() {
            Ok(p) if p.is_finite() => Some(p),
            _ => {
                warn!(external_id = listing.id, price = raw, "unparsable price, storing none");
                None
            },
        }
    });

    Ok(LocalProduct {
        external_id: listing.id.to_string(),
        sku: non_empty(variant.sku.as_deref()).map(str::to_owned),
        title: title.to_owned(),
        description: non_empty(listing.body_html.as_deref()).map(str::to_owned),
        weight: variant.weight,
        quantity: variant.inventory_quantity.max(0),
        price,
        vendor: non_empty(listing.vendor.as_deref()).map(str::to_owned),
        product_type: non_empty(listing.product_type.as_deref()).map(str::to_owned),
        image_url: listing.images.first().map(|img| img.src.clone()),
        tags: non_empty(listing.tags.as_deref()).map(str::to_owned),
        status: "active".into(),
        last_synced_at_ms: now_ms,
        created_at_ms: now_ms,
    })
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Create or update one record.
pub async fn reconcile_record(store: &dyn SyncStore, record: &RemoteProduct) -> RecordOutcome {
    let product = normalize(record, now_ms())?;
    let storage = |source: Error| RecordError::Storage {
        external_id: product.external_id.clone(),
        source,
    };

    let existing = store
        .find_product(&product.external_id)
        .await
        .map_err(storage)?;
    if existing.is_some() {
        store.update_product(&product).await.map_err(storage)?;
        return Ok(Upsert::Updated);
    }

    match store.insert_product(&product).await {
        Ok(()) => Ok(Upsert::Created),
        // Another run inserted it between the lookup and the insert.
        Err(Error::ProductExists { .. }) => {
            store.update_product(&product).await.map_err(storage)?;
            Ok(Upsert::Updated)
        },
        Err(e) => Err(storage(e)),
    }
}

/// Reconcile records in the order received and tally the outcomes.
pub async fn reconcile(store: &dyn SyncStore, records: &[RemoteProduct]) -> SyncTally {
    stream::iter(records)
        .then(|record| reconcile_record(store, record))
        .fold(SyncTally::default(), |mut tally, outcome| async move {
            match &outcome {
                Ok(upsert) => debug!(?upsert, "record reconciled"),
                Err(e) => warn!(error = %e, "record failed to reconcile"),
            }
            tally.record(&outcome);
            tally
        })
        .await
}
