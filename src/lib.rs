pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod reconcile;
pub mod scrapers;
pub mod sqlite;
pub mod storage;
pub mod types;
