//! Discogs shipping destinations.
//!
//! The Discogs API has no endpoint for the shipping policy editor, so the
//! destination list is read from a saved copy of the editor's HTML widget.

use std::fs;
use std::path::Path;

use scraper::Html;

use crate::IngestConfig;
use crate::fetch::FetchClient;
use crate::parser::{ParseError, StructureError, normalize_whitespace, selector};
use crate::provider::{FetchOptions, Fetcher, IngestContext, IngestError, ParsedRecords};
use crate::store::{Dataset, IngestSummary};
use crate::types::DestinationCountry;

pub struct DiscogsFetcher;

impl Fetcher for DiscogsFetcher {
    fn name(&self) -> &'static str {
        "discogs"
    }

    fn parse(
        &self,
        _client: &mut FetchClient,
        config: &IngestConfig,
        options: &FetchOptions,
    ) -> Result<ParsedRecords, IngestError> {
        if options.service.is_some() {
            log::warn!("discogs has no services; ignoring --service");
        }
        let source = options.source.as_deref().unwrap_or(&config.destinations_path);
        Ok(ParsedRecords {
            destinations: read_destinations(source, config)?,
            ..Default::default()
        })
    }
}

/// Sorted, deduplicated destination names from the widget HTML. Region
/// subheaders share the `region-name` class and are dropped via `ignore`.
pub fn parse_destinations(
    html: &str,
    ignore: &[String],
) -> Result<Vec<DestinationCountry>, IngestError> {
    let document = Html::parse_fragment(html);
    let region = selector(".region-name")?;

    let mut destinations = Vec::new();
    for element in document.select(&region) {
        let name = normalize_whitespace(&element.text().collect::<String>());
        if ignore.iter().any(|i| *i == name) {
            log::debug!("Skipping region subheader '{}'", name);
            continue;
        }
        destinations.push(DestinationCountry::new(&name)?);
    }
    destinations.sort();
    destinations.dedup();

    if destinations.is_empty() {
        return Err(ParseError::from(StructureError::Empty("destinations")).into());
    }
    Ok(destinations)
}

fn read_destinations(
    source: &Path,
    config: &IngestConfig,
) -> Result<Vec<DestinationCountry>, IngestError> {
    log::info!("Parsing {} for Discogs shipping destinations", source.display());
    let html = fs::read_to_string(source).map_err(|e| IngestError::Io {
        path: source.to_path_buf(),
        source: e,
    })?;
    let destinations = parse_destinations(&html, &config.ignore_region_names)?;
    log::info!("Parsed {} destinations", destinations.len());
    Ok(destinations)
}

pub fn fetch_destination_countries(
    ctx: &mut IngestContext<'_>,
    source: &Path,
) -> Result<IngestSummary, IngestError> {
    let destinations = read_destinations(source, ctx.config)?;
    let summary = ctx.store.ingest(Dataset::DiscogsCountries, &destinations)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn destinations_fixture() -> String {
        fs::read_to_string("fixtures/discogs/shipping-destinations.htm")
            .expect("Failed to read fixture")
    }

    fn names(destinations: &[DestinationCountry]) -> Vec<&str> {
        destinations.iter().map(|d| d.country_name.as_str()).collect()
    }

    #[test]
    fn test_parse_destinations_from_fixture() {
        let config = IngestConfig::default();

        let destinations = parse_destinations(&destinations_fixture(), &config.ignore_region_names)
            .expect("Failed to parse destinations");

        assert_eq!(
            names(&destinations),
            vec![
                "Afghanistan",
                "Argentina",
                "Bosnia and Herzegovina",
                "Brazil",
                "Canada",
                "China",
                "Costa Rica",
                "Japan",
                "Kazakhstan",
                "Mexico",
                "Thailand",
                "United States",
                "Viet Nam",
            ]
        );
    }

    #[test]
    fn test_region_subheaders_dropped() {
        let config = IngestConfig::default();

        let destinations = parse_destinations(&destinations_fixture(), &config.ignore_region_names)
            .expect("Failed to parse destinations");

        for region in &config.ignore_region_names {
            assert!(!names(&destinations).contains(&region.as_str()));
        }
    }

    #[test]
    fn test_duplicates_and_whitespace() {
        let html = r#"<ul>
            <li><span class="region-name">Canada</span></li>
            <li><span class="region-name">United
                Kingdom</span></li>
            <li><span class="region-name">Canada</span></li>
        </ul>"#;

        let destinations = parse_destinations(html, &[]).expect("Failed to parse destinations");

        assert_eq!(names(&destinations), vec!["Canada", "United Kingdom"]);
    }

    #[test]
    fn test_no_destinations() {
        let err = parse_destinations("<ul><li>Canada</li></ul>", &[]).unwrap_err();

        assert!(matches!(
            err,
            IngestError::Parse(ParseError::Structure(StructureError::Empty(_)))
        ));
    }

    #[test]
    fn test_missing_source_file() {
        let mut client = crate::FetchClient::with_transport(Box::new(
            crate::fetch::tests::StubTransport::default(),
        ));
        let mut store = crate::Store::open_in_memory().expect("Failed to open store");
        let config = IngestConfig::default();
        let mut ctx = IngestContext {
            client: &mut client,
            store: &mut store,
            config: &config,
        };

        let err = fetch_destination_countries(&mut ctx, Path::new("fixtures/discogs/missing.htm"))
            .unwrap_err();

        assert!(matches!(err, IngestError::Io { .. }));
    }

    #[test]
    fn test_default_source_missing_names_path() {
        let mut client = crate::FetchClient::with_transport(Box::new(
            crate::fetch::tests::StubTransport::default(),
        ));
        let config = IngestConfig {
            destinations_path: "fixtures/discogs/not-saved-yet.htm".into(),
            ..Default::default()
        };

        let err = DiscogsFetcher
            .parse(&mut client, &config, &FetchOptions::default())
            .unwrap_err();

        assert!(matches!(err, IngestError::Io { .. }));
        assert!(err.to_string().contains("fixtures/discogs/not-saved-yet.htm"));
    }
}
