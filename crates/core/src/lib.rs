//! Domain types shared across the booth backend.
//!
//! Holds the error taxonomy, capture-frame handling (data-URL decode,
//! capture identifiers), and the workflow library that loads style
//! definitions from disk and rewrites them for a specific capture.

pub mod capture;
pub mod error;
pub mod types;
pub mod workflow;
