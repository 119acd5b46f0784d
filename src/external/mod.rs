pub mod client;
pub mod data_api;
pub mod http_update_api;
pub mod update_api;

#[cfg(test)]
pub(crate) mod scripted;
