//! Read-only SQLite store
//!
//! Two tables are read: the zipcode reference table (`zipcode`, `county`) and
//! the case table, which comes in one of two layouts (see [`CaseLayout`]).
//! Every call opens its own read-only connection; nothing is cached.

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::types::Value;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};

use super::county::County;
use super::dates::canonical_date;
use super::error::LookupError;
use crate::config::{CaseLayout, DataConfig};
use crate::logger::{LogLevel, Logger};

/// Rows of the case table shown by [`CaseStore::describe`]
const SAMPLE_ROWS: usize = 5;

/// Shape of the backing data, logged at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub zipcode_rows: i64,
    pub case_columns: Vec<String>,
    pub sample_rows: Vec<Vec<String>>,
}

pub struct CaseStore {
    db_path: PathBuf,
    county: County,
    zipcode_table: String,
    case_table: String,
    layout: CaseLayout,
    column_prefix: String,
    logger: Arc<Logger>,
}

impl CaseStore {
    pub fn new(config: &DataConfig, logger: Arc<Logger>) -> Self {
        Self {
            db_path: PathBuf::from(&config.database_path),
            county: County::new(&config.county),
            zipcode_table: config.zipcode_table.clone(),
            case_table: config.case_table.clone(),
            layout: config.layout,
            column_prefix: config.column_prefix.clone(),
            logger,
        }
    }

    pub const fn county(&self) -> &County {
        &self.county
    }

    fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Zip codes of the configured county, ascending
    pub fn list_county_zipcodes(&self) -> rusqlite::Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT zipcode, county FROM {}",
            self.zipcode_table
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, Value>(0)?, row.get::<_, Value>(1)?))
        })?;

        let mut zipcodes = Vec::new();
        for row in rows {
            let (zipcode, county) = row?;
            if let (Some(zipcode), Some(county)) = (value_to_text(zipcode), value_to_text(county)) {
                if self.county.matches(&county) {
                    zipcodes.push(zipcode);
                }
            }
        }
        zipcodes.sort();
        zipcodes.dedup();

        self.logger.debug(
            "zip_lookup.done",
            &[
                ("county", &self.county.short_name()),
                ("count", &zipcodes.len()),
            ],
        );
        Ok(zipcodes)
    }

    /// Case count for `zipcode` on `date`, or `None` when the lookup is not valid
    ///
    /// Business failures are logged with their cause and reported as `None`.
    /// Only store failures (unreadable database, broken schema) are returned
    /// as errors.
    pub fn get_case_count(&self, zipcode: &str, date: &str) -> rusqlite::Result<Option<i64>> {
        match self.lookup_case_count(zipcode, date) {
            Ok(cases) => {
                self.logger.debug(
                    "case_lookup.found",
                    &[("zipcode", &zipcode), ("date", &date), ("cases", &cases)],
                );
                Ok(Some(cases))
            }
            Err(LookupError::Store(e)) => Err(e),
            Err(e) => {
                // A missing column means the data file does not match the configured layout
                let level = if matches!(e, LookupError::UnknownZipColumn { .. }) {
                    LogLevel::Error
                } else {
                    LogLevel::Debug
                };
                self.logger.event(
                    level,
                    &format!("case_lookup.{}", e.kind()),
                    &[("zipcode", &zipcode), ("date", &date), ("reason", &e)],
                );
                Ok(None)
            }
        }
    }

    /// Case count lookup with the failure cause preserved
    pub fn lookup_case_count(&self, zipcode: &str, date: &str) -> Result<i64, LookupError> {
        let conn = self.connect()?;

        let county = conn
            .query_row(
                &format!(
                    "SELECT county FROM {} WHERE zipcode = ?1",
                    self.zipcode_table
                ),
                params![zipcode],
                |row| row.get::<_, Value>(0),
            )
            .optional()?
            .and_then(value_to_text);
        if !county.is_some_and(|c| self.county.matches(&c)) {
            return Err(LookupError::NotInCounty {
                zipcode: zipcode.to_string(),
                county: self.county.short_name().to_string(),
            });
        }

        let date_key = canonical_date(date).map_err(|source| LookupError::InvalidDate {
            input: date.to_string(),
            source,
        })?;

        let cell = match self.layout {
            CaseLayout::Normalized => conn
                .query_row(
                    &format!(
                        "SELECT case_count FROM {} WHERE zipcode = ?1 AND date = ?2",
                        self.case_table
                    ),
                    params![zipcode, date_key],
                    |row| row.get::<_, Value>(0),
                )
                .optional()?,
            CaseLayout::Wide => {
                let column = format!("{}{zipcode}", self.column_prefix);
                let columns = table_columns(&conn, &self.case_table)?;
                if !columns.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
                    return Err(LookupError::UnknownZipColumn { column });
                }
                conn.query_row(
                    &format!(
                        "SELECT {} FROM {} WHERE date = ?1",
                        quote_identifier(&column),
                        self.case_table
                    ),
                    params![date_key],
                    |row| row.get::<_, Value>(0),
                )
                .optional()?
            }
        };

        cell.and_then(cell_to_count)
            .ok_or_else(|| LookupError::NoDataForDate {
                zipcode: zipcode.to_string(),
                date: date_key,
            })
    }

    pub fn describe(&self) -> rusqlite::Result<StoreSummary> {
        let conn = self.connect()?;
        let zipcode_rows = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.zipcode_table),
            [],
            |row| row.get(0),
        )?;
        let case_columns = table_columns(&conn, &self.case_table)?;

        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} LIMIT {SAMPLE_ROWS}",
            self.case_table
        ))?;
        let width = stmt.column_count();
        let sample_rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| {
                        row.get::<_, Value>(i)
                            .map(|v| value_to_text(v).unwrap_or_else(|| "NULL".to_string()))
                    })
                    .collect::<rusqlite::Result<Vec<_>>>()
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(StoreSummary {
            zipcode_rows,
            case_columns,
            sample_rows,
        })
    }

    /// Log the store layout at startup; an unreadable store is only a warning here
    pub fn log_summary(&self) {
        let path = self.db_path.display();
        match self.describe() {
            Ok(summary) => {
                self.logger.info(
                    "store.opened",
                    &[
                        ("path", &path),
                        ("layout", &format!("{:?}", self.layout).to_lowercase()),
                        ("zipcode_rows", &summary.zipcode_rows),
                        ("case_columns", &summary.case_columns.len()),
                    ],
                );
                self.logger.debug(
                    "store.schema",
                    &[("columns", &summary.case_columns.join(","))],
                );
                for row in &summary.sample_rows {
                    self.logger.debug("store.sample", &[("row", &row.join(","))]);
                }
            }
            Err(e) => self
                .logger
                .warn("store.unavailable", &[("path", &path), ("error", &e)]),
        }
    }
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    names.collect()
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Accept integers, whole reals within `i64` range and numeric text as counts
fn cell_to_count(value: Value) -> Option<i64> {
    match value {
        Value::Integer(n) => Some(n),
        Value::Real(f) => whole_i64(f),
        Value::Text(s) => s.trim().parse().ok(),
        Value::Null | Value::Blob(_) => None,
    }
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Integer(n) => Some(n.to_string()),
        Value::Real(f) => Some(whole_i64(f).map_or_else(|| f.to_string(), |n| n.to_string())),
        Value::Text(s) => Some(s),
        Value::Null | Value::Blob(_) => None,
    }
}

/// `f` as an integer when it is whole and representable
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn whole_i64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
    ((i64::MIN as f64..i64::MAX as f64).contains(&f) && f.fract() == 0.0).then_some(f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Scratch};

    #[test]
    fn test_lists_only_county_zipcodes() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let zipcodes = scratch.store().list_county_zipcodes().unwrap();
        assert_eq!(zipcodes, vec!["21901", "21904", "21921"]);
    }

    #[test]
    fn test_lists_exactly_target_county() {
        let scratch = Scratch::new(CaseLayout::Normalized);
        let conn = scratch.open_rw();
        testing::seed_reference(&conn, &[("21901", "Cecil County"), ("99999", "Other County")]);
        testing::seed_normalized_cases(&conn, &[]);
        drop(conn);

        assert_eq!(scratch.store().list_county_zipcodes().unwrap(), vec!["21901"]);
    }

    #[test]
    fn test_empty_reference_table_is_not_an_error() {
        let scratch = Scratch::new(CaseLayout::Normalized);
        let conn = scratch.open_rw();
        testing::seed_reference(&conn, &[]);
        drop(conn);

        assert!(scratch.store().list_county_zipcodes().unwrap().is_empty());
    }

    #[test]
    fn test_found_in_both_layouts() {
        for layout in [CaseLayout::Normalized, CaseLayout::Wide] {
            let scratch = Scratch::standard(layout);
            let store = scratch.store();
            assert_eq!(store.get_case_count("21901", "2022-02-14").unwrap(), Some(57));
            assert_eq!(store.get_case_count("21921", "2022-02-01").unwrap(), Some(3));
        }
    }

    #[test]
    fn test_repeated_lookups_agree() {
        let scratch = Scratch::standard(CaseLayout::Wide);
        let store = scratch.store();
        let first = store.get_case_count("21901", "2022-02-14").unwrap();
        for _ in 0..3 {
            assert_eq!(store.get_case_count("21901", "2022-02-14").unwrap(), first);
        }
    }

    #[test]
    fn test_unknown_zipcode_is_absent() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let store = scratch.store();
        for zipcode in ["99999", "", "21901' OR '1'='1", "z_21901"] {
            assert_eq!(store.get_case_count(zipcode, "2022-02-14").unwrap(), None);
            assert!(matches!(
                store.lookup_case_count(zipcode, "2022-02-14"),
                Err(LookupError::NotInCounty { .. })
            ));
        }
    }

    #[test]
    fn test_other_county_is_absent_regardless_of_date() {
        let scratch = Scratch::standard(CaseLayout::Wide);
        let store = scratch.store();
        for date in ["2022-02-14", "not-a-date"] {
            assert_eq!(store.get_case_count("21078", date).unwrap(), None);
            assert!(matches!(
                store.lookup_case_count("21078", date),
                Err(LookupError::NotInCounty { .. })
            ));
        }
    }

    #[test]
    fn test_invalid_date() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        let store = scratch.store();
        assert!(matches!(
            store.lookup_case_count("21901", "not-a-date"),
            Err(LookupError::InvalidDate { .. })
        ));
        assert_eq!(store.get_case_count("21901", "not-a-date").unwrap(), None);
    }

    #[test]
    fn test_missing_row_and_null_cell() {
        for layout in [CaseLayout::Normalized, CaseLayout::Wide] {
            let scratch = Scratch::standard(layout);
            let store = scratch.store();
            assert!(matches!(
                store.lookup_case_count("21901", "2022-02-20"),
                Err(LookupError::NoDataForDate { .. })
            ));
            assert!(matches!(
                store.lookup_case_count("21901", "2022-02-15"),
                Err(LookupError::NoDataForDate { .. })
            ));
        }
    }

    #[test]
    fn test_unknown_zip_column_is_logged_as_error() {
        let scratch = Scratch::standard(CaseLayout::Wide);
        let store = scratch.store();
        assert!(matches!(
            store.lookup_case_count("21904", "2022-02-14"),
            Err(LookupError::UnknownZipColumn { ref column }) if column == "z_21904"
        ));

        assert_eq!(store.get_case_count("21904", "2022-02-14").unwrap(), None);
        let lines = scratch.logger.captured();
        assert!(lines
            .iter()
            .any(|l| l.contains("[ERROR] case_lookup.unknown_zip_column zipcode=21904")));
    }

    #[test]
    fn test_in_county_zip_without_rows_in_normalized_table() {
        let scratch = Scratch::standard(CaseLayout::Normalized);
        assert!(matches!(
            scratch.store().lookup_case_count("21904", "2022-02-14"),
            Err(LookupError::NoDataForDate { .. })
        ));
    }

    #[test]
    fn test_loosely_typed_cells() {
        let scratch = Scratch::new(CaseLayout::Normalized);
        let conn = scratch.open_rw();
        testing::seed_reference(
            &conn,
            &[("21901", "Cecil"), ("21903", "Cecil"), ("21904", "Cecil")],
        );
        testing::seed_normalized_cases(&conn, &[]);
        conn.execute_batch(
            "INSERT INTO covid_cases VALUES ('21901', '2022-02-14', 7.0);
             INSERT INTO covid_cases VALUES ('21903', '2022-02-14', ' 12 ');
             INSERT INTO covid_cases VALUES ('21904', '2022-02-14', 2.5);",
        )
        .unwrap();
        drop(conn);

        let store = scratch.store();
        assert_eq!(store.get_case_count("21901", "2022-02-14").unwrap(), Some(7));
        assert_eq!(store.get_case_count("21903", "2022-02-14").unwrap(), Some(12));
        assert_eq!(store.get_case_count("21904", "2022-02-14").unwrap(), None);
    }

    #[test]
    fn test_missing_database_is_a_store_error() {
        let scratch = Scratch::new(CaseLayout::Normalized);
        let store = scratch.store();
        assert!(store.get_case_count("21901", "2022-02-14").is_err());
        assert!(store.list_county_zipcodes().is_err());
    }

    #[test]
    fn test_describe() {
        let scratch = Scratch::standard(CaseLayout::Wide);
        let summary = scratch.store().describe().unwrap();
        assert_eq!(summary.zipcode_rows, 4);
        assert_eq!(
            summary.case_columns,
            vec!["date", "z_21901", "z_21921", "z_21078"]
        );
        assert_eq!(summary.sample_rows.len(), 3);
        assert_eq!(summary.sample_rows[0][0], "2022-02-01");
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_to_count(Value::Integer(5)), Some(5));
        assert_eq!(cell_to_count(Value::Real(5.0)), Some(5));
        assert_eq!(cell_to_count(Value::Real(f64::NAN)), None);
        assert_eq!(cell_to_count(Value::Real(1e30)), None);
        assert_eq!(cell_to_count(Value::Real(-1e30)), None);
        assert_eq!(cell_to_count(Value::Real(9_223_372_036_854_775_808.0)), None);
        assert_eq!(cell_to_count(Value::Text("x".into())), None);
        assert_eq!(cell_to_count(Value::Null), None);
        assert_eq!(value_to_text(Value::Integer(21901)).as_deref(), Some("21901"));
    }
}
