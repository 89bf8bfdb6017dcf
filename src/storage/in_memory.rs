use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::traits::{CatalogStore, StoreResult};
use crate::domain::{validate_item, Grocer, ItemRecord, StoreRecord, UpsertOutcome};
use crate::error::StoreError;

type ItemKey = (i64, String, String);

#[derive(Default)]
struct Catalog {
    stores: HashMap<String, StoreRecord>,
    items: HashMap<ItemKey, ItemRecord>,
    next_store_id: i64,
    next_item_id: i64,
}

/// In-memory catalog for development/testing.
///
/// Everything sits behind one mutex, so each operation is atomic with respect
/// to concurrent callers.
#[derive(Default)]
pub struct InMemoryStore {
    catalog: Mutex<Catalog>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Catalog>> {
        self.catalog.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_or_create_store(
        &self,
        location_id: &str,
        grocer: Grocer,
    ) -> StoreResult<StoreRecord> {
        let mut catalog = self.lock()?;
        if let Some(existing) = catalog.stores.get(location_id) {
            return Ok(existing.clone());
        }

        catalog.next_store_id += 1;
        let store = StoreRecord {
            id: catalog.next_store_id,
            location_id: location_id.to_string(),
            grocer,
            created_at: Utc::now(),
        };
        catalog.stores.insert(location_id.to_string(), store.clone());

        debug!("Created store: {} ({}) with id {}", store.location_id, grocer, store.id);
        Ok(store)
    }

    async fn upsert_item(
        &self,
        name: &str,
        manufacturer: &str,
        price: Decimal,
        store_id: i64,
    ) -> StoreResult<UpsertOutcome> {
        validate_item(name, price).map_err(StoreError::InvalidRecord)?;

        let mut catalog = self.lock()?;
        if !catalog.stores.values().any(|s| s.id == store_id) {
            return Err(StoreError::StoreNotFound(store_id));
        }

        let key = (store_id, name.to_string(), manufacturer.to_string());
        if let Some(item) = catalog.items.get_mut(&key) {
            if item.price == price {
                return Ok(UpsertOutcome::Unchanged);
            }
            item.price = price;
            item.updated_at = Utc::now();
            debug!("Updated item: {} with id {}", item.name, item.id);
            return Ok(UpsertOutcome::Updated);
        }

        catalog.next_item_id += 1;
        let now = Utc::now();
        let item = ItemRecord {
            id: catalog.next_item_id,
            name: name.to_string(),
            manufacturer: manufacturer.to_string(),
            price,
            store_id,
            created_at: now,
            updated_at: now,
        };
        debug!("Created item: {} with id {}", item.name, item.id);
        catalog.items.insert(key, item);
        Ok(UpsertOutcome::Created)
    }

    async fn find_store(&self, location_id: &str) -> StoreResult<Option<StoreRecord>> {
        Ok(self.lock()?.stores.get(location_id).cloned())
    }

    async fn list_stores(&self) -> StoreResult<Vec<StoreRecord>> {
        let mut stores: Vec<StoreRecord> = self.lock()?.stores.values().cloned().collect();
        stores.sort_by_key(|s| s.id);
        Ok(stores)
    }

    async fn list_items(&self, store_id: i64) -> StoreResult<Vec<ItemRecord>> {
        let mut items: Vec<ItemRecord> = self
            .lock()?
            .items
            .values()
            .filter(|i| i.store_id == store_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.id);
        Ok(items)
    }

    async fn count_items(&self) -> StoreResult<usize> {
        Ok(self.lock()?.items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_find_or_create_store_is_idempotent() {
        let store = InMemoryStore::new();

        let first = store.find_or_create_store("S1", Grocer::StoreA).await.unwrap();
        let second = store.find_or_create_store("S1", Grocer::StoreB).await.unwrap();

        assert_eq!(first.id, second.id);
        // The grocer tag is fixed by the first import.
        assert_eq!(second.grocer, Grocer::StoreA);
        assert_eq!(store.list_stores().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_item_outcomes() {
        let store = InMemoryStore::new();
        let s1 = store.find_or_create_store("S1", Grocer::StoreA).await.unwrap();

        let created = store.upsert_item("Milk", "Acme", dec!(3.50), s1.id).await.unwrap();
        let unchanged = store.upsert_item("Milk", "Acme", dec!(3.5), s1.id).await.unwrap();
        let updated = store.upsert_item("Milk", "Acme", dec!(3.75), s1.id).await.unwrap();

        assert_eq!(created, UpsertOutcome::Created);
        assert_eq!(unchanged, UpsertOutcome::Unchanged);
        assert_eq!(updated, UpsertOutcome::Updated);

        let items = store.list_items(s1.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, dec!(3.75));
    }

    #[tokio::test]
    async fn test_identity_includes_manufacturer_and_store() {
        let store = InMemoryStore::new();
        let s1 = store.find_or_create_store("S1", Grocer::StoreA).await.unwrap();
        let s2 = store.find_or_create_store("S2", Grocer::StoreA).await.unwrap();

        store.upsert_item("Milk", "Acme", dec!(3.50), s1.id).await.unwrap();
        store.upsert_item("Milk", "Dairyland", dec!(3.10), s1.id).await.unwrap();
        store.upsert_item("Milk", "Acme", dec!(3.60), s2.id).await.unwrap();

        assert_eq!(store.count_items().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid_records() {
        let store = InMemoryStore::new();
        let s1 = store.find_or_create_store("S1", Grocer::StoreA).await.unwrap();

        assert!(matches!(
            store.upsert_item("", "Acme", dec!(1.00), s1.id).await,
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(matches!(
            store.upsert_item("Milk", "Acme", dec!(-1.00), s1.id).await,
            Err(StoreError::InvalidRecord(_))
        ));
        assert!(matches!(
            store.upsert_item("Milk", "Acme", dec!(1.00), 999).await,
            Err(StoreError::StoreNotFound(999))
        ));
        assert_eq!(store.count_items().await.unwrap(), 0);
    }
}
