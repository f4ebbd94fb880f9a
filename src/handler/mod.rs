//! Request handler module
//!
//! Routes requests to the search page, the search action, generated charts and
//! the health probe.

mod pages;
pub mod router;
mod search;
mod static_files;

// Re-export main entry point
pub use router::handle_request;
