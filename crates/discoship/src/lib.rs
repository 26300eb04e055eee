pub mod config;
pub mod discogs;
pub mod fetch;
pub mod parser;
pub mod provider;
pub mod store;
pub mod types;
pub mod usps;

pub use config::IngestConfig;
pub use fetch::{FetchClient, FetchError};
pub use provider::{FetchOptions, Fetcher, IngestContext, IngestError, ParsedRecords};
pub use store::{Dataset, Store, StoreError};

use chrono::{DateTime, Utc};

/// Source of "now" for anything that stamps or ages data.
pub type Clock = Box<dyn Fn() -> DateTime<Utc>>;

pub fn system_clock() -> Clock {
    Box::new(Utc::now)
}
