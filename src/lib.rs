pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod ingest;
pub mod model;
pub mod scan;
pub mod sink;
pub mod store;
