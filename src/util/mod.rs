//! Ambient I/O and CLI helpers that sit outside the core: bar-table
//! CSV ingestion, the CSV/JSON result artifacts from spec.md §6, and
//! the demo binary's argument parsing.
pub mod config;
pub mod csv_reader;
pub mod serde_ext;
