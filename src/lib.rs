pub mod config;
pub mod constants;
pub mod error;
pub mod fingerprint;
pub mod importer;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod storage;

// Domain data shapes shared across layers
pub mod domain;
