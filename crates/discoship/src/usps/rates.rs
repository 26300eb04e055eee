use scraper::Html;

use super::locator;
use crate::IngestConfig;
use crate::parser::{ParseError, RateTable, StructureError, extract_column_groups};
use crate::provider::{IngestContext, IngestError};
use crate::store::{Dataset, IngestSummary};
use crate::types::RateRecord;

/// FCPIS prices per price group. Notice 123 splits the groups over
/// consecutive tables under one heading; each table's columns are price
/// groups and its rows are weight steps.
pub fn parse_rate_table(html: &str, config: &IngestConfig) -> Result<Vec<RateRecord>, IngestError> {
    let document = Html::parse_document(html);
    let handles =
        locator(config).find_tables(&document, &config.rates_heading, config.rates_table_count)?;

    let mut records: Vec<RateRecord> = Vec::new();
    for handle in handles {
        let index = handle.index;
        let table = RateTable::from_handle(handle)?;
        let groups = extract_column_groups(&table, 1)?;
        log::debug!("Rate table {} holds {} price groups", index, groups.len());

        for (price_group, rates) in groups {
            let record = RateRecord::new(&price_group, rates)?;
            if records.iter().any(|r| r.price_group == record.price_group) {
                return Err(ParseError::from(StructureError::DuplicateKey {
                    key: record.price_group,
                    table: index,
                })
                .into());
            }
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(ParseError::from(StructureError::Empty("rate groups")).into());
    }
    Ok(records)
}

pub fn fetch_rate_table(ctx: &mut IngestContext<'_>) -> Result<IngestSummary, IngestError> {
    log::info!("Fetching FCPIS rates from {}", ctx.config.notice123_url);
    let html = ctx.client.fetch(&ctx.config.notice123_url, &[])?;
    let records = parse_rate_table(&html, ctx.config)?;
    log::info!("Parsed rates for {} price groups", records.len());

    let summary = ctx.store.ingest(Dataset::UspsFcpisRates, &records)?;
    Ok(summary)
}
