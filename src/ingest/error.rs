use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions for a roster ingestion run. Row-level problems (short
/// rows, missing section or group cells) are not errors; those rows are
/// skipped by the partitioner.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("uploaded file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {path} contains no sheets")]
    EmptyWorkbook { path: PathBuf },

    #[error("no header row found in sheet '{sheet}'")]
    NoHeaderFound { sheet: String },

    #[error("failed to create group directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write group file {path}: {source}")]
    GroupFileWrite {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },
}
