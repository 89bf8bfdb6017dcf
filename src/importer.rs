use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::domain::{Grocer, UpsertOutcome};
use crate::error::{ImportError, Result};
use crate::fingerprint::{Fingerprint, HashingReader};
use crate::metrics::ImporterMetrics;
use crate::parser::{FeedParser, ParsedFeed, ParserSelector};
use crate::storage::CatalogStore;

/// One product whose upsert failed during a run
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub name: String,
    pub manufacturer: String,
    pub error: String,
}

/// Outcome of a single import run
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub source: String,
    pub grocer: Grocer,
    pub location_id: String,
    pub store_id: i64,
    pub feed_sha256: String,
    pub feed_bytes: u64,
    pub total_products: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed_upserts: usize,
    pub failures: Vec<ItemFailure>,
    pub duration: Duration,
}

impl ImportSummary {
    /// Products that reached `upsert_item`, successfully or not
    pub fn attempted(&self) -> usize {
        self.succeeded() + self.failed_upserts
    }

    pub fn succeeded(&self) -> usize {
        self.created + self.updated + self.unchanged
    }

    /// Products never attempted because the run was cancelled
    pub fn skipped(&self) -> usize {
        self.total_products - self.attempted()
    }
}

/// Result of one file in a multi-file import
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<ImportSummary>,
}

/// Drives feeds through select, parse, resolve store, upsert loop and summary.
///
/// The importer keeps no state between runs; any number of runs may share it.
pub struct Importer {
    store: Arc<dyn CatalogStore>,
}

impl std::fmt::Debug for Importer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Importer")
            .field("store", &"<Arc<dyn CatalogStore>>")
            .finish()
    }
}

impl Importer {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    /// Import one feed file, choosing the parser from its file name.
    pub async fn import_file(
        &self,
        path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary> {
        self.import_file_with_format(path, None, cancel).await
    }

    /// Import one feed file. `format` overrides the file name when given.
    pub async fn import_file_with_format(
        &self,
        path: impl AsRef<Path>,
        format: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary> {
        let path = path.as_ref();
        let run_id = Uuid::new_v4();
        let source = path.display().to_string();
        let span = info_span!("import_run", %run_id, source = %source);

        async move {
            let started = Instant::now();
            info!(file = %source, "importer: starting import");
            ImporterMetrics::run_started();

            let parser = match format {
                Some(tag) => ParserSelector::for_tag(tag),
                None => ParserSelector::for_path(path),
            }
            .inspect_err(|e| {
                warn!("importer: {}", e);
                ImporterMetrics::run_failed("select");
            })?;

            let (feed, fingerprint) = read_feed(parser.as_ref(), path)?;
            self.load(run_id, source, parser.grocer(), feed, fingerprint, started, cancel)
                .await
        }
        .instrument(span)
        .await
    }

    /// Import a feed from an already opened stream. `source` names the stream
    /// in logs and in the summary.
    pub async fn import_reader<R: Read>(
        &self,
        parser: &dyn FeedParser,
        reader: R,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("import_run", %run_id, source = %source);

        async move {
            let started = Instant::now();
            info!(source = %source, grocer = %parser.grocer(), "importer: starting import");
            ImporterMetrics::run_started();

            let mut reader = HashingReader::new(reader);
            let feed = parse_feed(parser, &mut reader)?;
            let fingerprint = reader.finish();
            self.load(
                run_id,
                source.to_string(),
                parser.grocer(),
                feed,
                fingerprint,
                started,
                cancel,
            )
            .await
        }
        .instrument(span)
        .await
    }

    /// Import several files one after another. A failed file does not stop the
    /// ones after it; cancellation does.
    pub async fn import_files(
        &self,
        paths: &[PathBuf],
        format: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            if cancel.is_cancelled() {
                warn!("importer: cancelled, {} file(s) not started", paths.len() - outcomes.len());
                break;
            }
            let result = self.import_file_with_format(path, format, cancel).await;
            outcomes.push(FileOutcome {
                path: path.clone(),
                result,
            });
        }
        outcomes
    }

    /// Resolve the store and upsert every product, in feed order.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(grocer = %grocer))]
    async fn load(
        &self,
        run_id: Uuid,
        source: String,
        grocer: Grocer,
        feed: ParsedFeed,
        fingerprint: Fingerprint,
        started: Instant,
        cancel: &CancellationToken,
    ) -> Result<ImportSummary> {
        let ParsedFeed {
            location_id,
            products,
        } = feed;

        info!(
            store = %location_id,
            grocer = %grocer,
            products = products.len(),
            bytes = fingerprint.bytes,
            sha256 = %fingerprint.sha256,
            "importer: parsed data"
        );
        ImporterMetrics::feed_parsed(grocer, products.len(), fingerprint.bytes);

        let store = self
            .store
            .find_or_create_store(&location_id, grocer)
            .await
            .map_err(|source| {
                error!(store = %location_id, "importer: failed to resolve store: {}", source);
                ImporterMetrics::run_failed("resolve_store");
                ImportError::StoreResolution {
                    location_id: location_id.clone(),
                    source,
                }
            })?;

        if store.grocer != grocer {
            warn!(
                store = %location_id,
                "importer: store was created by a {} feed, importing {} feed into it",
                store.grocer,
                grocer
            );
        }

        let mut summary = ImportSummary {
            run_id,
            source,
            grocer,
            location_id,
            store_id: store.id,
            feed_sha256: fingerprint.sha256,
            feed_bytes: fingerprint.bytes,
            total_products: products.len(),
            created: 0,
            updated: 0,
            unchanged: 0,
            failed_upserts: 0,
            failures: Vec::new(),
            duration: Duration::ZERO,
        };

        for product in &products {
            if cancel.is_cancelled() {
                summary.duration = started.elapsed();
                warn!(
                    store = %summary.location_id,
                    upserted = summary.attempted(),
                    remaining = summary.skipped(),
                    "importer: import aborted by cancellation"
                );
                ImporterMetrics::run_failed("cancelled");
                return Err(ImportError::Cancelled {
                    summary: Box::new(summary),
                });
            }

            debug!(sku = %product.external_sku, "importer: upserting {}", product.name);
            match self
                .store
                .upsert_item(&product.name, &product.manufacturer, product.price, store.id)
                .await
            {
                Ok(outcome) => {
                    match outcome {
                        UpsertOutcome::Created => summary.created += 1,
                        UpsertOutcome::Updated => summary.updated += 1,
                        UpsertOutcome::Unchanged => summary.unchanged += 1,
                    }
                    ImporterMetrics::item_upserted(grocer, outcome);
                }
                Err(e) => {
                    // One bad item must not fail the whole batch.
                    error!(product = %product.name, error = %e, "failed to upsert item");
                    ImporterMetrics::item_failed(grocer);
                    summary.failed_upserts += 1;
                    summary.failures.push(ItemFailure {
                        name: product.name.clone(),
                        manufacturer: product.manufacturer.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        summary.duration = started.elapsed();
        info!(
            store = %summary.location_id,
            total_products = summary.total_products,
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            failed_upserts = summary.failed_upserts,
            duration_ms = summary.duration.as_millis() as u64,
            "importer: import complete"
        );
        ImporterMetrics::run_completed(&summary);
        Ok(summary)
    }
}

/// Open and decode a feed file. The file handle lives only inside this
/// function, so it is closed before any store call is made.
#[instrument(skip(parser), fields(grocer = %parser.grocer()))]
fn read_feed(parser: &dyn FeedParser, path: &Path) -> Result<(ParsedFeed, Fingerprint)> {
    let file = File::open(path).map_err(|source| {
        error!(file = %path.display(), "importer: opening file: {}", source);
        ImporterMetrics::run_failed("open");
        ImportError::FeedOpen {
            path: path.display().to_string(),
            source,
        }
    })?;

    let mut reader = HashingReader::new(file);
    let feed = parse_feed(parser, &mut reader)?;
    Ok((feed, reader.finish()))
}

fn parse_feed(parser: &dyn FeedParser, reader: &mut dyn Read) -> Result<ParsedFeed> {
    parser.parse(reader).map_err(|e| {
        error!("importer: parsing store data: {}", e);
        ImporterMetrics::run_failed("parse");
        ImportError::Parse(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::StoreAParser;
    use crate::storage::InMemoryStore;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn importer() -> (Importer, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (Importer::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_import_reader_counts_outcomes() {
        let (importer, store) = importer();
        let feed = json!({
            "store_location_id": "S1",
            "products": [
                {"product_name": "Milk", "manufacturer": "Acme", "retail_price": 3.50, "sku": "A1"},
                {"product_name": "Eggs", "manufacturer": "Acme", "retail_price": 4.10, "sku": "A2"}
            ]
        })
        .to_string();
        let cancel = CancellationToken::new();

        let first = importer
            .import_reader(&StoreAParser, feed.as_bytes(), "inline", &cancel)
            .await
            .unwrap();
        assert_eq!(first.total_products, 2);
        assert_eq!(first.created, 2);
        assert_eq!(first.failed_upserts, 0);
        assert_eq!(first.feed_bytes, feed.len() as u64);

        let second = importer
            .import_reader(&StoreAParser, feed.as_bytes(), "inline", &cancel)
            .await
            .unwrap();
        assert_eq!(second.unchanged, 2);
        assert_eq!(second.feed_sha256, first.feed_sha256);
        assert_eq!(store.count_items().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_item_upserts_nothing() {
        let (importer, store) = importer();
        let feed = json!({
            "store_location_id": "S1",
            "products": [{"product_name": "Milk", "retail_price": 1}]
        })
        .to_string();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = importer
            .import_reader(&StoreAParser, feed.as_bytes(), "inline", &cancel)
            .await
            .unwrap_err();

        match err {
            ImportError::Cancelled { summary } => {
                assert_eq!(summary.attempted(), 0);
                assert_eq!(summary.skipped(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // The store was resolved before the loop started.
        assert!(store.find_store("S1").await.unwrap().is_some());
        assert_eq!(store.count_items().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_feed_succeeds() {
        let (importer, store) = importer();
        let cancel = CancellationToken::new();
        let summary = importer
            .import_reader(
                &StoreAParser,
                r#"{"store_location_id": "S-EMPTY", "products": []}"#.as_bytes(),
                "inline",
                &cancel,
            )
            .await
            .unwrap();

        assert_eq!(summary.total_products, 0);
        assert_eq!(summary.attempted(), 0);
        assert_eq!(store.list_stores().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_items_are_isolated() {
        let (importer, store) = importer();
        let feed = json!({
            "store_location_id": "S1",
            "products": [
                {"product_name": "Milk", "retail_price": 3.50},
                {"product_name": "", "retail_price": 1.00},
                {"product_name": "Refund", "retail_price": -2.00},
                {"product_name": "Bread", "retail_price": 2.00}
            ]
        })
        .to_string();
        let cancel = CancellationToken::new();

        let summary = importer
            .import_reader(&StoreAParser, feed.as_bytes(), "inline", &cancel)
            .await
            .unwrap();

        assert_eq!(summary.created, 2);
        assert_eq!(summary.failed_upserts, 2);
        assert_eq!(summary.failures[1].name, "Refund");
        let items = store.list_items(summary.store_id).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].price, dec!(2.00));
    }
}
