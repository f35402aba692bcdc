use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::debug;

use crate::ingest::error::IngestError;

/// One row of raw cell values, index-addressed from column A. Cells the
/// sheet never touched are explicit `Data::Empty` so positional lookups
/// stay aligned with the on-disk layout.
pub type RosterRow = Vec<Data>;

/// Read the first sheet (by workbook order) of the file at `path` and split
/// it into the header row and the data region.
///
/// Rows are scanned from the top; fully blank rows before the first row with
/// any content are tolerated, and the first non-blank row becomes the header.
/// Everything after it is returned as data, including interior blank rows;
/// filtering those is the partitioner's job.
pub fn load_first_sheet(path: &Path) -> Result<(RosterRow, Vec<RosterRow>), IngestError> {
    if !path.exists() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut workbook = open_workbook_auto(path).map_err(|source| IngestError::Workbook {
        path: path.to_path_buf(),
        source,
    })?;
    let sheet = workbook
        .sheet_names()
        .first()
        .map(|name| name.to_string())
        .ok_or_else(|| IngestError::EmptyWorkbook {
            path: path.to_path_buf(),
        })?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|source| IngestError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;

    let mut rows = absolute_rows(&range);
    let header_index = rows
        .iter()
        .position(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .ok_or(IngestError::NoHeaderFound { sheet })?;

    let data = rows.split_off(header_index + 1);
    let header = rows.pop().expect("header row exists at header_index");
    debug!(
        header_index,
        columns = header.len(),
        data_rows = data.len(),
        "located header row"
    );
    Ok((header, data))
}

/// Re-anchor a used-cell range at A1. Calamine ranges start at the first
/// used cell, but header detection and the positional column contract both
/// count from the sheet origin, so leading blank rows become empty vecs and
/// leading blank columns become `Data::Empty` padding.
fn absolute_rows(range: &Range<Data>) -> Vec<RosterRow> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };
    let mut rows: Vec<RosterRow> = vec![RosterRow::new(); start_row as usize];
    for row in range.rows() {
        let mut absolute = vec![Data::Empty; start_col as usize];
        absolute.extend_from_slice(row);
        rows.push(absolute);
    }
    rows
}

/// Display form of a cell, matching how spreadsheet UIs render it: integral
/// floats lose the trailing `.0`, empty cells are the empty string.
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{:?}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use rust_xlsxwriter::Workbook;
    use tempfile::TempDir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,rostersplit=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn write_fixture(dir: &TempDir, name: &str, rows: &[(u32, Vec<&str>)]) -> Result<std::path::PathBuf> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (row, cells) in rows {
            for (col, value) in cells.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(*row, col as u16, *value)?;
                }
            }
        }
        let path = dir.path().join(name);
        workbook.save(&path)?;
        Ok(path)
    }

    #[test]
    fn header_is_first_row_when_sheet_starts_at_a1() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let path = write_fixture(
            &dir,
            "roster.xlsx",
            &[
                (0, vec!["No", "Ref", "X", "Matricule", "Nom", "Prenom", "Section", "Groupe"]),
                (1, vec!["1", "", "", "M1", "Doe", "Jane", "A", "G1"]),
            ],
        )?;

        let (header, data) = load_first_sheet(&path)?;
        assert_eq!(cell_text(&header[0]), "No");
        assert_eq!(cell_text(&header[7]), "Groupe");
        assert_eq!(data.len(), 1);
        assert_eq!(cell_text(&data[0][3]), "M1");
        Ok(())
    }

    #[test]
    fn leading_blank_rows_are_skipped_without_shifting_columns() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        // Rows 0-1 untouched, header on row 2, data on rows 3-4.
        let path = write_fixture(
            &dir,
            "offset.xlsx",
            &[
                (2, vec!["No", "Ref", "X", "Matricule", "Nom", "Prenom", "Section", "Groupe"]),
                (3, vec!["1", "", "", "M1", "Doe", "Jane", "A", "G1"]),
                (4, vec!["2", "", "", "M2", "Roe", "Rick", "A", "G2"]),
            ],
        )?;

        let (header, data) = load_first_sheet(&path)?;
        assert_eq!(cell_text(&header[3]), "Matricule");
        assert_eq!(data.len(), 2);
        assert_eq!(cell_text(&data[0][3]), "M1");
        assert_eq!(cell_text(&data[1][7]), "G2");
        Ok(())
    }

    #[test]
    fn blank_sheet_reports_no_header() -> Result<()> {
        init_test_logging();
        let dir = TempDir::new()?;
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        let path = dir.path().join("blank.xlsx");
        workbook.save(&path)?;

        match load_first_sheet(&path) {
            Err(IngestError::NoHeaderFound { .. }) => Ok(()),
            other => panic!("expected NoHeaderFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn missing_file_is_reported_before_parsing() {
        init_test_logging();
        let missing = Path::new("definitely/not/here.xlsx");
        match load_first_sheet(missing) {
            Err(IngestError::FileNotFound { path }) => assert_eq!(path, missing),
            other => panic!("expected FileNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn numeric_cells_render_without_trailing_zero() {
        assert_eq!(cell_text(&Data::Float(20230045.0)), "20230045");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("  G1 ".into())), "  G1 ");
    }
}
