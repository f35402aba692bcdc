use std::fs;
use std::path::{Path, PathBuf};

use calamine::Data;
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::debug;

use crate::ingest::error::IngestError;
use crate::ingest::partition::GroupBucket;
use crate::ingest::workbook::{cell_text, RosterRow};
use crate::ingest::{GroupFile, IngestOptions};

/// Write one workbook per non-empty group bucket under a `Groupes`
/// subdirectory next to the source file, and describe each file written.
///
/// File names are derived only from the uploaded name and the group key;
/// re-uploading the same roster overwrites the same files. Any write failure
/// aborts the run; there is no partial-success reporting.
pub fn write_group_files(
    source: &Path,
    original_name: &str,
    header: &RosterRow,
    groups: &[GroupBucket],
    opts: &IngestOptions,
) -> Result<Vec<GroupFile>, IngestError> {
    let out_dir = match source.parent() {
        Some(parent) => parent.join(&opts.group_dir_name),
        None => PathBuf::from(&opts.group_dir_name),
    };
    // Must tolerate the directory already existing, including a concurrent
    // upload creating it first.
    fs::create_dir_all(&out_dir).map_err(|source| IngestError::CreateDir {
        path: out_dir.clone(),
        source,
    })?;

    let base_name = Path::new(original_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| original_name.to_string());

    let mut files = Vec::with_capacity(groups.len());
    for bucket in groups {
        if bucket.rows.is_empty() {
            continue;
        }

        let file_name = format!("{}_{}.xlsx", base_name, sanitize_key(&bucket.key));
        let path = out_dir.join(&file_name);
        write_sheet(&path, &opts.sheet_name, header, &bucket.rows).map_err(|source| {
            IngestError::GroupFileWrite {
                path: path.clone(),
                source,
            }
        })?;
        debug!(
            group = %bucket.key,
            rows = bucket.rows.len(),
            file = %path.display(),
            "wrote group file"
        );

        files.push(GroupFile {
            section_name: bucket.section.clone(),
            group_name: bucket.key.clone(),
            file_name,
            file_path: path.display().to_string(),
            student_count: bucket.rows.len(),
            students: opts.include_rows_in_report.then(|| {
                bucket
                    .rows
                    .iter()
                    .map(|row| row.iter().map(cell_text).collect())
                    .collect()
            }),
        });
    }
    Ok(files)
}

/// Whitespace runs become underscores so the key survives as a file name.
fn sanitize_key(key: &str) -> String {
    key.split_whitespace().collect::<Vec<_>>().join("_")
}

fn write_sheet(
    path: &Path,
    sheet_name: &str,
    header: &RosterRow,
    rows: &[RosterRow],
) -> Result<(), XlsxError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    for (col, cell) in header.iter().enumerate() {
        write_cell(sheet, 0, col as u16, cell)?;
    }
    for (index, row) in rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            write_cell(sheet, (index + 1) as u32, col as u16, cell)?;
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Data) -> Result<(), XlsxError> {
    match cell {
        Data::Empty => {}
        Data::String(s) => {
            sheet.write_string(row, col, s)?;
        }
        Data::Float(f) => {
            sheet.write_number(row, col, *f)?;
        }
        Data::Int(i) => {
            sheet.write_number(row, col, *i as f64)?;
        }
        Data::Bool(b) => {
            sheet.write_boolean(row, col, *b)?;
        }
        Data::DateTime(dt) => {
            sheet.write_number(row, col, dt.as_f64())?;
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => {
            sheet.write_string(row, col, s)?;
        }
        Data::Error(e) => {
            sheet.write_string(row, col, format!("{:?}", e))?;
        }
    }
    Ok(())
}
