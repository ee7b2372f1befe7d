//! Export of surfaced records.
//!
//! Every article page that was extracted yields a record, whether or not it
//! was stored. [`json`] writes those records to a file for downstream use.

pub mod json;
