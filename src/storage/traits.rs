use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{Grocer, ItemRecord, StoreRecord, UpsertOutcome};
use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence contract the importer runs against.
///
/// Both write operations are idempotent. Implementations must guarantee at
/// most one store per `location_id` and at most one item per
/// `(name, manufacturer, store_id)` even when several importers share the
/// same backing storage.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Return the store registered under `location_id`, creating it tagged with
    /// `grocer` if it does not exist yet. An existing store keeps its original grocer.
    async fn find_or_create_store(&self, location_id: &str, grocer: Grocer)
        -> StoreResult<StoreRecord>;

    /// Create the item or refresh its price.
    async fn upsert_item(
        &self,
        name: &str,
        manufacturer: &str,
        price: Decimal,
        store_id: i64,
    ) -> StoreResult<UpsertOutcome>;

    // Read side, used by the CLI listings and tests
    async fn find_store(&self, location_id: &str) -> StoreResult<Option<StoreRecord>>;
    async fn list_stores(&self) -> StoreResult<Vec<StoreRecord>>;
    async fn list_items(&self, store_id: i64) -> StoreResult<Vec<ItemRecord>>;
    async fn count_items(&self) -> StoreResult<usize>;
}
