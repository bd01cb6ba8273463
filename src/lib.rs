//! AI Scrape Assistant
//!
//! Client for an AI-backed selector extraction API, with local verification:
//! - form session state (HTML input, oversized-paste attachments, fields)
//! - versioned history of extraction results
//! - tri-state validation of selectors, regexes and extraction functions
//!   against the HTML snapshot (via scraper and a sandboxed swc interpreter)
//! - model catalog with per-run price estimates

pub mod client;
pub mod config;
pub mod error;
pub mod html;
pub mod keystore;
pub mod models;
pub mod session;
pub mod types;
pub mod validate;

pub use error::Error;
pub use html::Document;
pub use session::FormSession;
pub use validate::{ValidationOutcome, ValidationTarget, Validity};
