//! Upload backend for class roster spreadsheets.
//!
//! Teachers and branch admins upload one roster workbook per course; this
//! service splits it into one workbook per (section, group) bucket, stages
//! everything under the upload directory, and reports the sections, groups,
//! students and student→group memberships it found so the caller can persist
//! them. See `ingest` for the splitting pipeline and `server` for the HTTP
//! surface.

pub mod config;
pub mod ingest;
pub mod server;
