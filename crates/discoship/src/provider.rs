use std::path::PathBuf;

use serde::Serialize;

use crate::config::IngestConfig;
use crate::discogs::DiscogsFetcher;
use crate::fetch::{FetchClient, FetchError};
use crate::parser::ParseError;
use crate::store::{Dataset, IngestSummary, Store, StoreError};
use crate::types::{
    DestinationCountry, PriceGroupRecord, RateRecord, RecordError, ServiceParseError,
};
use crate::usps::UspsFetcher;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Invalid record: {0}")]
    Record(#[from] RecordError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Service(#[from] ServiceParseError),
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unknown provider '{0}'. Available: {available}", available = names().join(", "))]
    UnknownProvider(String),
}

/// Everything an ingest run needs: where pages come from, where records go,
/// and the tunables in between.
pub struct IngestContext<'a> {
    pub client: &'a mut FetchClient,
    pub store: &'a mut Store,
    pub config: &'a IngestConfig,
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub all: bool,
    pub cpg: bool,
    pub rates: bool,
    /// Service code, e.g. "FCPIS". Providers without services ignore it.
    pub service: Option<String>,
    /// Local file to read instead of the provider's default source.
    pub source: Option<PathBuf>,
}

/// Records read from a provider's sources, one field per dataset. Datasets
/// that were not selected stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedRecords {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub price_groups: Vec<PriceGroupRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rates: Vec<RateRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<DestinationCountry>,
}

impl ParsedRecords {
    pub fn is_empty(&self) -> bool {
        self.price_groups.is_empty() && self.rates.is_empty() && self.destinations.is_empty()
    }

    /// Writes every non-empty dataset, each in its own transaction.
    pub fn ingest(&self, store: &mut Store) -> Result<Vec<IngestSummary>, IngestError> {
        let mut summaries = Vec::new();
        if !self.price_groups.is_empty() {
            summaries.push(store.ingest(Dataset::UspsPriceGroups, &self.price_groups)?);
        }
        if !self.rates.is_empty() {
            summaries.push(store.ingest(Dataset::UspsFcpisRates, &self.rates)?);
        }
        if !self.destinations.is_empty() {
            summaries.push(store.ingest(Dataset::DiscogsCountries, &self.destinations)?);
        }
        Ok(summaries)
    }
}

/// A provider's ingest capability, selected by name at runtime.
pub trait Fetcher: Sync {
    fn name(&self) -> &'static str;

    /// Reads and parses the datasets `options` selects. Nothing is stored.
    fn parse(
        &self,
        client: &mut FetchClient,
        config: &IngestConfig,
        options: &FetchOptions,
    ) -> Result<ParsedRecords, IngestError>;

    /// Parses everything first, then stores it, so a parse failure in one
    /// dataset leaves the store untouched.
    fn fetch(
        &self,
        ctx: &mut IngestContext<'_>,
        options: &FetchOptions,
    ) -> Result<Vec<IngestSummary>, IngestError> {
        let parsed = self.parse(ctx.client, ctx.config, options)?;
        parsed.ingest(ctx.store)
    }
}

pub static PROVIDERS: &[&dyn Fetcher] = &[&UspsFetcher, &DiscogsFetcher];

pub fn lookup(name: &str) -> Result<&'static dyn Fetcher, IngestError> {
    PROVIDERS
        .iter()
        .copied()
        .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| IngestError::UnknownProvider(name.to_string()))
}

pub fn names() -> Vec<&'static str> {
    PROVIDERS.iter().map(|p| p.name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("USPS").expect("usps registered").name(), "usps");
        assert_eq!(lookup("discogs").expect("discogs registered").name(), "discogs");
    }

    #[test]
    fn test_unknown_provider_lists_alternatives() {
        let err = lookup("canadapost").err().expect("not registered");

        assert!(matches!(err, IngestError::UnknownProvider(_)));
        assert_eq!(
            err.to_string(),
            "Unknown provider 'canadapost'. Available: usps, discogs"
        );
    }
}
