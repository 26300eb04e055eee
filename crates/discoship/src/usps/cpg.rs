use scraper::Html;

use super::locator;
use crate::IngestConfig;
use crate::parser::{ParseError, RateTable, StructureError, extract_rows};
use crate::provider::{IngestContext, IngestError};
use crate::store::{Dataset, IngestSummary};
use crate::types::{PriceGroupRecord, UspsService};

/// Country → price group for `service`, from the country listing table.
///
/// Rows for countries the service does not reach ("n/a" and friends) and rows
/// labelled with an ignored group label are left out.
pub fn parse_price_groups(
    html: &str,
    service: UspsService,
    config: &IngestConfig,
) -> Result<Vec<PriceGroupRecord>, IngestError> {
    let document = Html::parse_document(html);
    let handle = locator(config).find_table(&document, &config.cpg_heading, 0)?;
    let table = RateTable::from_handle(handle)?;

    let column = table.resolve_column(service.header_label())?;
    log::debug!("{} price groups are in column {}", service, column);

    let mut records = Vec::new();
    for (country, price_group) in extract_rows(&table, column)? {
        if config.ignore_row_labels.iter().any(|label| *label == country) {
            log::debug!("Skipping group label row '{}'", country);
            continue;
        }
        if config.is_placeholder(&price_group) {
            log::debug!("{} not available to {} ({})", service, country, price_group);
            continue;
        }
        records.push(PriceGroupRecord::new(&country, service, &price_group)?);
    }

    if records.is_empty() {
        return Err(ParseError::from(StructureError::Empty("price groups")).into());
    }
    Ok(records)
}

pub fn fetch_price_groups(
    ctx: &mut IngestContext<'_>,
    service: UspsService,
) -> Result<IngestSummary, IngestError> {
    log::info!(
        "Fetching {} country price groups from {}",
        service,
        ctx.config.notice123_url
    );
    let html = ctx.client.fetch(&ctx.config.notice123_url, &[])?;
    let records = parse_price_groups(&html, service, ctx.config)?;
    log::info!("Parsed {} {} price groups", records.len(), service);

    let summary = ctx.store.ingest(Dataset::UspsPriceGroups, &records)?;
    Ok(summary)
}
