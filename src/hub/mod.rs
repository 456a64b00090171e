mod cache;
mod client;
mod types;

pub use cache::ModelCache;
pub use client::HubClient;
pub use types::{CacheEntry, HubError};
