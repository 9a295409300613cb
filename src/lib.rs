pub mod config;
pub mod db;
pub mod errors;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod services;
