//! Case data module
//!
//! County membership, the date list offered to users, and the read-only
//! SQLite store holding reference and case tables.

pub mod county;
pub mod dates;
pub mod error;
pub mod store;

pub use store::CaseStore;
