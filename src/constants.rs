/// Retailer format tags. These appear in feed file names, in the `--format`
/// flag and as the persisted grocer value of a store record.
pub const STORE_A: &str = "store_a";
pub const STORE_B: &str = "store_b";
pub const STORE_C: &str = "store_c";

// Configuration defaults
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const DEFAULT_DATABASE_PATH: &str = "data/catalog.db";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const LOG_FILE_NAME: &str = "importer.log";

// Environment overrides
pub const ENV_DATABASE_PATH: &str = "CATALOG_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "CATALOG_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "CATALOG_LOG_DIR";
pub const ENV_PRODUCTION: &str = "CATALOG_PRODUCTION";
pub const ENV_METRICS_LISTEN: &str = "CATALOG_METRICS_LISTEN";

/// Get all supported grocer tags
pub fn supported_grocer_tags() -> Vec<&'static str> {
    vec![STORE_A, STORE_B, STORE_C]
}
