//! Roster splitting pipeline: load the uploaded workbook, bucket its rows by
//! section and group, write one workbook per bucket, and summarize what was
//! found for the caller to persist.

pub mod error;
pub mod partition;
pub mod workbook;
pub mod writer;

use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::info;

pub use error::IngestError;
pub use workbook::RosterRow;

/// Per-run knobs. The defaults reproduce the plain upload flow; branch-aware
/// uploads canonicalize section names and drop the raw rows from the report.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Collapse section spelling variants onto `Section X` and key groups by
    /// `{section}_{group}` instead of the raw group name.
    pub normalize_sections: bool,
    /// Copy each group's raw rows into its [`GroupFile`] descriptor.
    pub include_rows_in_report: bool,
    /// Branch / academic-year label, carried through logs only.
    pub context: Option<String>,
    /// Name of the per-group output directory next to the source file.
    pub group_dir_name: String,
    /// Sheet name used in every generated workbook.
    pub sheet_name: String,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            normalize_sections: false,
            include_rows_in_report: true,
            context: None,
            group_dir_name: "Groupes".to_string(),
            sheet_name: "Students".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub matricule: String,
    pub first_name: String,
    pub last_name: String,
}

/// One student→group membership, keyed the same way the group buckets are.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGroup {
    pub matricule: String,
    pub group_name: String,
}

/// Descriptor for one written group workbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupFile {
    pub section_name: String,
    pub group_name: String,
    pub file_name: String,
    pub file_path: String,
    pub student_count: usize,
    /// Raw rows as displayed text, present when the caller asked for them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<Vec<String>>>,
}

/// Everything one ingestion run reports back. The caller persists sections,
/// groups, students and memberships into its own store; nothing here is
/// retained between runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub sections: Vec<String>,
    pub group_files: Vec<GroupFile>,
    pub students: Vec<Student>,
    pub student_groups: Vec<StudentGroup>,
}

/// Run the whole pipeline against a staged upload.
///
/// `path` is the workbook on disk; `original_name` is the client-supplied
/// file name and only seeds the generated file names. The run either returns
/// a complete summary or the first fatal error; it never reports partially
/// written output.
#[tracing::instrument(
    level = "info",
    skip(path, opts),
    fields(path = %path.display(), context = opts.context.as_deref().unwrap_or("-"))
)]
pub fn split_roster_to_groups(
    path: &Path,
    original_name: &str,
    opts: &IngestOptions,
) -> Result<RosterSummary, IngestError> {
    let start = Instant::now();

    let (header, data_rows) = workbook::load_first_sheet(path)?;
    let partition = partition::partition_rows(data_rows, opts.normalize_sections);
    let group_files = writer::write_group_files(path, original_name, &header, &partition.groups, opts)?;

    info!(
        sections = partition.sections.len(),
        groups = group_files.len(),
        students = partition.students.len(),
        elapsed = ?start.elapsed(),
        "roster split complete"
    );

    Ok(RosterSummary {
        sections: partition.sections,
        group_files,
        students: partition.students,
        student_groups: partition.memberships,
    })
}
