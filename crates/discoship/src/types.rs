use std::fmt::Display;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("invalid regex: decimal"));
static RE_PRICE_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("invalid regex: price group"));

pub const WEIGHT_GROUPS: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Empty country name")]
    EmptyCountry,
    #[error("Invalid price group '{value}' for {country}")]
    InvalidPriceGroup { country: String, value: String },
    #[error("Price group {price_group} has {found} rate(s), expected 4")]
    RateCount { price_group: String, found: usize },
    #[error("Invalid rate '{value}' for price group {price_group}")]
    InvalidRate { price_group: String, value: String },
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid USPS service '{0}'. Accepted values: pmei, pmi, fcmi, fcpis, ipa, isal")]
pub struct ServiceParseError(String);

/// USPS international services as labelled on Notice 123.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UspsService {
    Pmei,
    Pmi,
    Fcmi,
    #[default]
    Fcpis,
    Ipa,
    Isal,
}

impl UspsService {
    pub const ALL: [UspsService; 6] = [
        UspsService::Pmei,
        UspsService::Pmi,
        UspsService::Fcmi,
        UspsService::Fcpis,
        UspsService::Ipa,
        UspsService::Isal,
    ];

    /// Value stored in `usps_cpg.usps_service_code`.
    pub fn code(&self) -> &'static str {
        match self {
            UspsService::Pmei => "PMEI",
            UspsService::Pmi => "PMI",
            UspsService::Fcmi => "FCMI",
            UspsService::Fcpis => "FCPIS",
            UspsService::Ipa => "IPA",
            UspsService::Isal => "ISAL",
        }
    }

    /// Text of the price group column heading for this service.
    pub fn header_label(&self) -> &'static str {
        match self {
            UspsService::Pmei => "Priority Mail Express International",
            UspsService::Pmi => "Priority Mail International",
            UspsService::Fcmi => "First-Class Mail",
            UspsService::Fcpis => "FCPIS",
            UspsService::Ipa => "IPA",
            UspsService::Isal => "ISAL",
        }
    }
}

impl FromStr for UspsService {
    type Err = ServiceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UspsService::ALL
            .into_iter()
            .find(|svc| svc.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ServiceParseError(s.to_string()))
    }
}

impl Display for UspsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceGroupRecord {
    pub country_name: String,
    pub service_code: String,
    pub price_group: String,
}

impl PriceGroupRecord {
    pub fn new(
        country_name: &str,
        service: UspsService,
        price_group: &str,
    ) -> Result<Self, RecordError> {
        let country_name = country_name.trim();
        if country_name.is_empty() {
            return Err(RecordError::EmptyCountry);
        }
        let price_group = price_group.trim();
        if !RE_PRICE_GROUP.is_match(price_group) {
            return Err(RecordError::InvalidPriceGroup {
                country: country_name.to_string(),
                value: price_group.to_string(),
            });
        }
        Ok(Self {
            country_name: country_name.to_string(),
            service_code: service.code().to_string(),
            price_group: price_group.to_string(),
        })
    }
}

impl Display for PriceGroupRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<40} {:<6} {}",
            self.country_name, self.service_code, self.price_group
        )
    }
}

/// Prices for one price group across the four weight classes
/// (up to 8, 32, 48 and 64 oz). Kept as printed, e.g. "26.00".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateRecord {
    pub price_group: String,
    pub rates: [String; WEIGHT_GROUPS],
}

impl RateRecord {
    pub fn new(price_group: &str, rates: Vec<String>) -> Result<Self, RecordError> {
        let price_group = price_group.trim().to_string();
        if !RE_PRICE_GROUP.is_match(&price_group) {
            return Err(RecordError::InvalidPriceGroup {
                country: "rate table".to_string(),
                value: price_group,
            });
        }
        if let Some(bad) = rates.iter().find(|r| !RE_DECIMAL.is_match(r)) {
            return Err(RecordError::InvalidRate {
                price_group,
                value: bad.clone(),
            });
        }
        let found = rates.len();
        let rates: [String; WEIGHT_GROUPS] = rates
            .try_into()
            .map_err(|_| RecordError::RateCount {
                price_group: price_group.clone(),
                found,
            })?;
        Ok(Self { price_group, rates })
    }
}

impl Display for RateRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>3}", self.price_group)?;
        for rate in &self.rates {
            write!(f, " {:>8}", rate)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DestinationCountry {
    pub country_name: String,
}

impl DestinationCountry {
    pub fn new(country_name: &str) -> Result<Self, RecordError> {
        let country_name = country_name.trim();
        if country_name.is_empty() {
            return Err(RecordError::EmptyCountry);
        }
        Ok(Self {
            country_name: country_name.to_string(),
        })
    }
}

impl Display for DestinationCountry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.country_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_service_from_code() {
        assert_eq!("fcpis".parse::<UspsService>().unwrap(), UspsService::Fcpis);
        assert_eq!(" PMI ".parse::<UspsService>().unwrap(), UspsService::Pmi);
        assert!("ground".parse::<UspsService>().is_err());
        assert_eq!(UspsService::default(), UspsService::Fcpis);
    }

    #[test]
    fn test_price_group_record_validation() {
        let record = PriceGroupRecord::new(" Canada ", UspsService::Fcpis, "1")
            .expect("valid record");
        assert_eq!(record.country_name, "Canada");
        assert_eq!(record.service_code, "FCPIS");

        assert!(matches!(
            PriceGroupRecord::new("Cuba", UspsService::Fcpis, "n/a"),
            Err(RecordError::InvalidPriceGroup { .. })
        ));
        assert!(matches!(
            PriceGroupRecord::new("", UspsService::Fcpis, "1"),
            Err(RecordError::EmptyCountry)
        ));
    }

    #[test]
    fn test_rate_record_keeps_decimal_text() {
        let record = RateRecord::new("1", rates(&["17.85", "26.00", "38.50", "47.60"]))
            .expect("valid record");

        assert_eq!(record.rates[1], "26.00");
    }

    #[test]
    fn test_rate_record_wrong_shape() {
        assert!(matches!(
            RateRecord::new("1", rates(&["17.85", "26.00", "38.50"])),
            Err(RecordError::RateCount { found: 3, .. })
        ));
        assert!(matches!(
            RateRecord::new("1", rates(&["17.85", "$26.00", "38.50", "47.60"])),
            Err(RecordError::InvalidRate { .. })
        ));
        assert!(matches!(
            RateRecord::new("Weight", rates(&["1", "2", "3", "4"])),
            Err(RecordError::InvalidPriceGroup { .. })
        ));
    }
}
