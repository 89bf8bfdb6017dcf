//! Import run metrics
//!
//! Counters are labelled by grocer tag; failure counters additionally carry
//! the stage that aborted the run.

use ::metrics::{counter, describe_counter, describe_histogram, histogram};

use crate::domain::{Grocer, UpsertOutcome};
use crate::importer::ImportSummary;

pub const RUNS_STARTED: &str = "catalog_import_runs_started_total";
pub const RUNS_COMPLETED: &str = "catalog_import_runs_completed_total";
pub const RUNS_FAILED: &str = "catalog_import_runs_failed_total";
pub const PRODUCTS_PARSED: &str = "catalog_import_products_parsed_total";
pub const ITEMS_UPSERTED: &str = "catalog_import_items_upserted_total";
pub const ITEMS_FAILED: &str = "catalog_import_items_failed_total";
pub const RUN_DURATION: &str = "catalog_import_run_duration_seconds";
pub const FEED_BYTES: &str = "catalog_import_feed_bytes";

/// Metrics collection for import runs
pub struct ImporterMetrics;

impl ImporterMetrics {
    pub fn describe() {
        describe_counter!(RUNS_STARTED, "Import runs started");
        describe_counter!(RUNS_COMPLETED, "Import runs that reached the summary stage");
        describe_counter!(RUNS_FAILED, "Import runs aborted, by stage");
        describe_counter!(PRODUCTS_PARSED, "Products decoded from feeds");
        describe_counter!(ITEMS_UPSERTED, "Item upserts, by outcome");
        describe_counter!(ITEMS_FAILED, "Item upserts that failed and were skipped");
        describe_histogram!(RUN_DURATION, "Wall time of completed import runs");
        describe_histogram!(FEED_BYTES, "Size of decoded feeds in bytes");
    }

    pub fn run_started() {
        counter!(RUNS_STARTED).increment(1);
    }

    pub fn feed_parsed(grocer: Grocer, products: usize, bytes: u64) {
        counter!(PRODUCTS_PARSED, "grocer" => grocer.tag()).increment(products as u64);
        histogram!(FEED_BYTES, "grocer" => grocer.tag()).record(bytes as f64);
    }

    pub fn item_upserted(grocer: Grocer, outcome: UpsertOutcome) {
        let outcome = match outcome {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Unchanged => "unchanged",
        };
        counter!(ITEMS_UPSERTED, "grocer" => grocer.tag(), "outcome" => outcome).increment(1);
    }

    pub fn item_failed(grocer: Grocer) {
        counter!(ITEMS_FAILED, "grocer" => grocer.tag()).increment(1);
    }

    /// `stage` is one of select, open, parse, resolve_store, cancelled
    pub fn run_failed(stage: &'static str) {
        counter!(RUNS_FAILED, "stage" => stage).increment(1);
    }

    pub fn run_completed(summary: &ImportSummary) {
        counter!(RUNS_COMPLETED, "grocer" => summary.grocer.tag()).increment(1);
        histogram!(RUN_DURATION, "grocer" => summary.grocer.tag())
            .record(summary.duration.as_secs_f64());
    }
}
