use thiserror::Error;

/// Why a case lookup produced no count
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("zipcode {zipcode} is not in {county} County")]
    NotInCounty { zipcode: String, county: String },

    #[error("invalid date '{input}': {source}")]
    InvalidDate {
        input: String,
        source: chrono::ParseError,
    },

    #[error("case table has no column {column}")]
    UnknownZipColumn { column: String },

    #[error("no case count for zipcode {zipcode} on {date}")]
    NoDataForDate { zipcode: String, date: String },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl LookupError {
    /// Short name used as the log event suffix
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotInCounty { .. } => "not_in_county",
            Self::InvalidDate { .. } => "invalid_date",
            Self::UnknownZipColumn { .. } => "unknown_zip_column",
            Self::NoDataForDate { .. } => "no_data_for_date",
            Self::Store(_) => "store",
        }
    }
}
