//! SQLite persistence for ingested reference data.
//!
//! Every ingest is one transaction: the record upserts and the dataset's
//! `last_ingest_*` timestamp either all land or none do.

mod upsert;

pub use upsert::{OnConflict, UpsertPlan, Upsertable};

use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, ToSql, Transaction, params, params_from_iter};
use serde::Serialize;

use crate::types::{DestinationCountry, PriceGroupRecord, RateRecord};
use crate::{Clock, system_clock};

const INGEST_SCHEMA: &str = include_str!("ingest.sql");
const CONFIG_SCHEMA: &str = include_str!("config.sql");

const DROP_INGEST_TABLES: &str = "
    DROP TABLE IF EXISTS usps_cpg;
    DROP TABLE IF EXISTS usps_fcpis_rates;
    DROP TABLE IF EXISTS discogs_destination_countries;
";
const DROP_CONFIG_TABLE: &str = "DROP TABLE IF EXISTS config;";

const UPDATE_LAST_INGEST: &str = "UPDATE config SET value = ?1 WHERE name = ?2";
const SELECT_CONFIG_VALUE: &str = "SELECT value FROM config WHERE name = ?1";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Updating {name} affected {affected} row(s), expected 1; has the schema been initialized?")]
    TimestampRow { name: &'static str, affected: usize },
    #[error("Refusing to ingest an empty {0} dataset")]
    Empty(Dataset),
}

/// One independently refreshed body of ingested data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dataset {
    UspsPriceGroups,
    UspsFcpisRates,
    DiscogsCountries,
}

impl Dataset {
    pub fn config_key(&self) -> &'static str {
        match self {
            Dataset::UspsPriceGroups => "last_ingest_usps_cpg",
            Dataset::UspsFcpisRates => "last_ingest_usps_fcpis_rates",
            Dataset::DiscogsCountries => "last_ingest_discogs_countries",
        }
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dataset::UspsPriceGroups => write!(f, "USPS country price groups"),
            Dataset::UspsFcpisRates => write!(f, "USPS FCPIS rates"),
            Dataset::DiscogsCountries => write!(f, "discogs destination countries"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub dataset: Dataset,
    pub records: usize,
    pub rows_affected: usize,
    pub ingested_at: String,
}

impl Display for IngestSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} record(s), {} row(s) written at {} (UTC)",
            self.dataset, self.records, self.rows_affected, self.ingested_at
        )
    }
}

pub struct Store {
    conn: Connection,
    clock: Clock,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        log::debug!("Opening database {}", path.as_ref().display());
        Ok(Self {
            conn: Connection::open(path)?,
            clock: system_clock(),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            clock: system_clock(),
        })
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Creates any missing tables and timestamp rows. Existing data is kept.
    pub fn ensure_schema(&mut self) -> Result<(), StoreError> {
        self.transaction(|tx| {
            tx.execute_batch(INGEST_SCHEMA)?;
            tx.execute_batch(CONFIG_SCHEMA)?;
            Ok(())
        })
    }

    /// Drops and recreates every table. All data, including config, is lost.
    pub fn init_schema(&mut self) -> Result<(), StoreError> {
        log::warn!("Recreating database schema; all existing data is dropped");
        self.transaction(|tx| {
            tx.execute_batch(DROP_INGEST_TABLES)?;
            tx.execute_batch(DROP_CONFIG_TABLE)?;
            tx.execute_batch(INGEST_SCHEMA)?;
            tx.execute_batch(CONFIG_SCHEMA)?;
            Ok(())
        })
    }

    /// Drops and recreates the tables filled by ingests; config survives.
    pub fn recreate_ingest_tables(&mut self) -> Result<(), StoreError> {
        self.transaction(|tx| {
            tx.execute_batch(DROP_INGEST_TABLES)?;
            tx.execute_batch(INGEST_SCHEMA)?;
            Ok(())
        })
    }

    /// Drops and recreates the config table, clearing all user settings.
    pub fn reset_config(&mut self) -> Result<(), StoreError> {
        self.transaction(|tx| {
            tx.execute_batch(DROP_CONFIG_TABLE)?;
            tx.execute_batch(CONFIG_SCHEMA)?;
            Ok(())
        })
    }

    pub fn dump_config(&self) -> Result<BTreeMap<String, Option<String>>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT name, value FROM config")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn last_ingest(&self, dataset: Dataset) -> Result<Option<String>, StoreError> {
        let value: Option<Option<String>> = self
            .conn
            .query_row(SELECT_CONFIG_VALUE, [dataset.config_key()], |row| row.get(0))
            .optional()?;
        Ok(value.flatten())
    }

    /// Runs `f` in a transaction, committing if it returns `Ok`. Any error
    /// rolls everything back.
    pub fn transaction<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
    {
        let tx = self.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize, StoreError> {
        log::debug!("execute: {}", sql.trim());
        Ok(self.conn.execute(sql, params)?)
    }

    /// Runs `sql` once per parameter row, all or nothing.
    pub fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<usize, StoreError> {
        log::debug!("execute_many: {} ({} rows)", sql.trim(), rows.len());
        self.transaction(|tx| {
            let mut stmt = tx.prepare(sql)?;
            let mut affected = 0;
            for row in rows {
                affected += stmt.execute(params_from_iter(row.iter()))?;
            }
            Ok(affected)
        })
    }

    pub fn query_all(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Vec<Value>>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let width = stmt.column_count();
        let rows = stmt.query_map(params, |row| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<Result<Vec<_>, _>>()
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn query_one(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Option<Vec<Value>>, StoreError> {
        Ok(self.query_all(sql, params)?.into_iter().next())
    }

    /// Upserts `records` and stamps `dataset` as ingested now, atomically.
    pub fn ingest<R: Upsertable>(
        &mut self,
        dataset: Dataset,
        records: &[R],
    ) -> Result<IngestSummary, StoreError> {
        if records.is_empty() {
            return Err(StoreError::Empty(dataset));
        }
        let ingested_at = format_timestamp((self.clock)());
        let name = dataset.config_key();

        let rows_affected = self.transaction(|tx| {
            let mut stmt = tx.prepare(&R::PLAN.sql())?;
            let mut affected = 0;
            for record in records {
                affected += stmt.execute(record.params().as_slice())?;
            }

            let updated = tx.execute(UPDATE_LAST_INGEST, params![ingested_at, name])?;
            if updated != 1 {
                return Err(StoreError::TimestampRow {
                    name,
                    affected: updated,
                });
            }
            Ok(affected)
        })?;

        log::info!("{}: updated {} rows", R::PLAN.table, rows_affected);
        log::info!("Updated {}: {} (UTC)", name, ingested_at);
        Ok(IngestSummary {
            dataset,
            records: records.len(),
            rows_affected,
            ingested_at,
        })
    }

    pub fn load_price_groups(&self) -> Result<Vec<PriceGroupRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT country_name, usps_service_code, price_group FROM usps_cpg
             ORDER BY country_name, usps_service_code",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PriceGroupRecord {
                country_name: row.get(0)?,
                service_code: row.get(1)?,
                price_group: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn load_rates(&self) -> Result<Vec<RateRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT price_group, weight_group_1, weight_group_2, weight_group_3, weight_group_4
             FROM usps_fcpis_rates ORDER BY CAST(price_group AS INTEGER)",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RateRecord {
                price_group: row.get(0)?,
                rates: [row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?],
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn load_destinations(&self) -> Result<Vec<DestinationCountry>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT country_name FROM discogs_destination_countries ORDER BY country_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DestinationCountry {
                country_name: row.get(0)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}
