use rusqlite::ToSql;

use crate::types::{DestinationCountry, PriceGroupRecord, RateRecord};

/// What to do when a row with the same natural key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    /// Replace these columns with the incoming values.
    Overwrite(&'static [&'static str]),
    /// Keep the stored row untouched.
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertPlan {
    pub table: &'static str,
    pub columns: &'static [&'static str],
    pub conflict_key: &'static [&'static str],
    pub on_conflict: OnConflict,
}

impl UpsertPlan {
    pub fn sql(&self) -> String {
        let placeholders = (1..=self.columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let action = match self.on_conflict {
            OnConflict::Ignore => "DO NOTHING".to_string(),
            OnConflict::Overwrite(columns) => format!(
                "DO UPDATE SET {}",
                columns
                    .iter()
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
            self.table,
            self.columns.join(", "),
            placeholders,
            self.conflict_key.join(", "),
            action
        )
    }
}

/// A record that knows which table it lands in and how.
pub trait Upsertable {
    const PLAN: UpsertPlan;

    /// Values in `PLAN.columns` order.
    fn params(&self) -> Vec<&dyn ToSql>;
}

impl Upsertable for PriceGroupRecord {
    const PLAN: UpsertPlan = UpsertPlan {
        table: "usps_cpg",
        columns: &["country_name", "usps_service_code", "price_group"],
        conflict_key: &["country_name", "usps_service_code"],
        on_conflict: OnConflict::Overwrite(&["price_group"]),
    };

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![
            &self.country_name as &dyn ToSql,
            &self.service_code,
            &self.price_group,
        ]
    }
}

impl Upsertable for RateRecord {
    const PLAN: UpsertPlan = UpsertPlan {
        table: "usps_fcpis_rates",
        columns: &[
            "price_group",
            "weight_group_1",
            "weight_group_2",
            "weight_group_3",
            "weight_group_4",
        ],
        conflict_key: &["price_group"],
        on_conflict: OnConflict::Overwrite(&[
            "weight_group_1",
            "weight_group_2",
            "weight_group_3",
            "weight_group_4",
        ]),
    };

    fn params(&self) -> Vec<&dyn ToSql> {
        let [w1, w2, w3, w4] = &self.rates;
        vec![&self.price_group as &dyn ToSql, w1, w2, w3, w4]
    }
}

impl Upsertable for DestinationCountry {
    const PLAN: UpsertPlan = UpsertPlan {
        table: "discogs_destination_countries",
        columns: &["country_name"],
        conflict_key: &["country_name"],
        on_conflict: OnConflict::Ignore,
    };

    fn params(&self) -> Vec<&dyn ToSql> {
        vec![&self.country_name as &dyn ToSql]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_sql() {
        assert_eq!(
            PriceGroupRecord::PLAN.sql(),
            "INSERT INTO usps_cpg (country_name, usps_service_code, price_group) \
             VALUES (?1, ?2, ?3) ON CONFLICT (country_name, usps_service_code) \
             DO UPDATE SET price_group = excluded.price_group"
        );
    }

    #[test]
    fn test_rates_overwrite_every_weight_column() {
        assert_eq!(
            RateRecord::PLAN.sql(),
            "INSERT INTO usps_fcpis_rates (price_group, weight_group_1, weight_group_2, \
             weight_group_3, weight_group_4) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (price_group) DO UPDATE SET \
             weight_group_1 = excluded.weight_group_1, \
             weight_group_2 = excluded.weight_group_2, \
             weight_group_3 = excluded.weight_group_3, \
             weight_group_4 = excluded.weight_group_4"
        );
    }

    #[test]
    fn test_ignore_sql() {
        assert_eq!(
            DestinationCountry::PLAN.sql(),
            "INSERT INTO discogs_destination_countries (country_name) VALUES (?1) \
             ON CONFLICT (country_name) DO NOTHING"
        );
    }

    #[test]
    fn test_params_follow_columns() {
        let record = RateRecord::new(
            "3",
            vec!["20.00".into(), "37.35".into(), "56.25".into(), "74.35".into()],
        )
        .expect("valid record");

        assert_eq!(record.params().len(), RateRecord::PLAN.columns.len());
    }
}
