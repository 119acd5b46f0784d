//! Client for the price-data platform's dataset-update runner and series
//! endpoints: job tracking with progress polling and cancellation, plus the
//! table and base-100 helpers the dashboards share.

pub mod config;
pub mod errors;
pub mod external;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use config::TrackerConfig;
pub use errors::TrackerError;
pub use state::AppState;
