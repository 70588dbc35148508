pub mod catalog;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod ledger;
pub mod request;
pub mod service;
pub mod store;
pub mod sync;
pub mod telemetry;
pub mod transaction;
pub mod types;
pub mod utils;
