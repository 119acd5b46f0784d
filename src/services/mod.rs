pub mod derived_table;
pub mod job_controller;
pub mod job_poller;
pub mod series_normalizer;
