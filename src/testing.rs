//! Scratch databases and state for unit tests

use std::path::PathBuf;
use std::sync::Arc;

use rusqlite::{params, Connection};
use tempfile::TempDir;

use crate::cases::CaseStore;
use crate::config::{AppState, CaseLayout, Config};
use crate::logger::{LogLevel, Logger};

/// Reference rows of the standard fixture; 21904 is in the county but has no case data
pub const STANDARD_REFERENCE: &[(&str, &str)] = &[
    ("21901", "Cecil County"),
    ("21921", "Cecil"),
    ("21904", "Cecil"),
    ("21078", "Harford County"),
];

pub struct Scratch {
    pub dir: TempDir,
    pub config: Config,
    pub logger: Arc<Logger>,
}

impl Scratch {
    /// Empty scratch directory; the database file does not exist yet
    pub fn new(layout: CaseLayout) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_from("no-such-config-file").unwrap();
        config.data.database_path = dir.path().join("data.db").display().to_string();
        config.data.layout = layout;
        if layout == CaseLayout::Wide {
            config.data.case_table = "feb2022_cases_by_zipcode".to_string();
        }
        config.charts.output_dir = dir.path().join("graphs").display().to_string();

        Self {
            dir,
            config,
            logger: Arc::new(Logger::buffered(LogLevel::Debug)),
        }
    }

    /// Scratch database seeded with [`STANDARD_REFERENCE`] and matching cases
    pub fn standard(layout: CaseLayout) -> Self {
        let scratch = Self::new(layout);
        let conn = scratch.open_rw();
        seed_reference(&conn, STANDARD_REFERENCE);
        match layout {
            CaseLayout::Normalized => seed_normalized_cases(
                &conn,
                &[
                    ("21901", "2022-02-01", Some(1)),
                    ("21901", "2022-02-14", Some(57)),
                    ("21901", "2022-02-15", None),
                    ("21921", "2022-02-01", Some(3)),
                    ("21078", "2022-02-14", Some(40)),
                ],
            ),
            CaseLayout::Wide => seed_wide_cases(
                &conn,
                &scratch.config.data.case_table,
                &["z_21901", "z_21921", "z_21078"],
                &[
                    ("2022-02-01", &[Some(1), Some(3), Some(2)]),
                    ("2022-02-14", &[Some(57), None, Some(40)]),
                    ("2022-02-15", &[None, Some(4), Some(41)]),
                ],
            ),
        }
        scratch
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.config.data.database_path)
    }

    pub fn open_rw(&self) -> Connection {
        Connection::open(self.db_path()).unwrap()
    }

    pub fn store(&self) -> CaseStore {
        CaseStore::new(&self.config.data, Arc::clone(&self.logger))
    }

    pub fn state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(self.config.clone(), Arc::clone(&self.logger)).unwrap())
    }
}

pub fn seed_reference(conn: &Connection, rows: &[(&str, &str)]) {
    conn.execute_batch("CREATE TABLE zipcode_lookup (zipcode TEXT PRIMARY KEY, county TEXT)")
        .unwrap();
    for (zipcode, county) in rows {
        conn.execute(
            "INSERT INTO zipcode_lookup (zipcode, county) VALUES (?1, ?2)",
            params![zipcode, county],
        )
        .unwrap();
    }
}

pub fn seed_normalized_cases(conn: &Connection, rows: &[(&str, &str, Option<i64>)]) {
    conn.execute_batch(
        "CREATE TABLE covid_cases (
            zipcode TEXT NOT NULL,
            date TEXT NOT NULL,
            case_count INTEGER,
            PRIMARY KEY (zipcode, date)
        )",
    )
    .unwrap();
    for (zipcode, date, cases) in rows {
        conn.execute(
            "INSERT INTO covid_cases (zipcode, date, case_count) VALUES (?1, ?2, ?3)",
            params![zipcode, date, cases],
        )
        .unwrap();
    }
}

pub fn seed_wide_cases(
    conn: &Connection,
    table: &str,
    columns: &[&str],
    rows: &[(&str, &[Option<i64>])],
) {
    let column_defs: Vec<String> = columns.iter().map(|c| format!("\"{c}\" INTEGER")).collect();
    conn.execute_batch(&format!(
        "CREATE TABLE {table} (date TEXT, {})",
        column_defs.join(", ")
    ))
    .unwrap();

    let placeholders = vec!["?"; columns.len() + 1].join(", ");
    let sql = format!("INSERT INTO {table} VALUES ({placeholders})");
    for (date, values) in rows {
        let mut row: Vec<rusqlite::types::Value> = vec![(*date).to_string().into()];
        row.extend(values.iter().map(|v| (*v).into()));
        conn.execute(&sql, rusqlite::params_from_iter(row)).unwrap();
    }
}
