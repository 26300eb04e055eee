//! USPS international price data from Notice 123.

mod cpg;
mod rates;

pub use cpg::{fetch_price_groups, parse_price_groups};
pub use rates::{fetch_rate_table, parse_rate_table};

use crate::IngestConfig;
use crate::fetch::FetchClient;
use crate::parser::TableLocator;
use crate::provider::{FetchOptions, Fetcher, IngestError, ParsedRecords};
use crate::types::UspsService;

pub struct UspsFetcher;

impl Fetcher for UspsFetcher {
    fn name(&self) -> &'static str {
        "usps"
    }

    fn parse(
        &self,
        client: &mut FetchClient,
        config: &IngestConfig,
        options: &FetchOptions,
    ) -> Result<ParsedRecords, IngestError> {
        let service = match &options.service {
            Some(code) => code.parse::<UspsService>()?,
            None => UspsService::default(),
        };
        if options.source.is_some() {
            log::warn!("usps always fetches {}; ignoring --source", config.notice123_url);
        }

        let mut parsed = ParsedRecords::default();
        let (cpg, rates) = (options.all || options.cpg, options.all || options.rates);
        if !cpg && !rates {
            log::warn!("Nothing selected for usps; pass --all, --cpg or --rates");
            return Ok(parsed);
        }

        log::info!("Fetching Notice 123 from {}", config.notice123_url);
        let html = client.fetch(&config.notice123_url, &[])?;
        if cpg {
            parsed.price_groups = parse_price_groups(&html, service, config)?;
            log::info!("Parsed {} {} price groups", parsed.price_groups.len(), service);
        }
        if rates {
            parsed.rates = parse_rate_table(&html, config)?;
            log::info!("Parsed rates for {} price groups", parsed.rates.len());
        }
        Ok(parsed)
    }
}

pub(crate) fn locator(config: &IngestConfig) -> TableLocator {
    TableLocator::new(config.table_walk_limit).ignoring(config.ignore_headings.iter().cloned())
}
