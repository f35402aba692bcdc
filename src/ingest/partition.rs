use std::collections::HashMap;

use tracing::trace;

use crate::ingest::workbook::{cell_text, RosterRow};
use crate::ingest::{Student, StudentGroup};

// Positional roster layout, counted from column A. Anything before these
// columns (row number, internal references, ...) is carried through to the
// group files untouched.
const COL_MATRICULE: usize = 3;
const COL_LAST_NAME: usize = 4;
const COL_FIRST_NAME: usize = 5;
const COL_SECTION: usize = 6;
const COL_GROUP: usize = 7;

/// Rows accumulated for one (section, group) bucket, in encounter order.
#[derive(Debug)]
pub struct GroupBucket {
    /// Partition key: the raw group name, or `{section}_{group}` when
    /// section naming is canonicalized.
    pub key: String,
    /// Section display name the bucket belongs to.
    pub section: String,
    pub rows: Vec<RosterRow>,
}

/// Everything the partitioner derives from the data region of one roster.
#[derive(Debug, Default)]
pub struct Partition {
    /// Distinct section names, first-seen order.
    pub sections: Vec<String>,
    /// Group buckets, first-seen order.
    pub groups: Vec<GroupBucket>,
    pub students: Vec<Student>,
    pub memberships: Vec<StudentGroup>,
}

#[derive(Debug)]
enum RowSkip {
    TooShort,
    MissingSection,
    MissingGroup,
}

struct RowFields {
    matricule: String,
    last_name: String,
    first_name: String,
    section: String,
    group_key: String,
}

/// Bucket data rows by section and group.
///
/// A row participates only if it reaches the group column and has non-empty
/// section and group cells after trimming; anything else is dropped without
/// failing the run. A row additionally yields a [`Student`] and a membership
/// entry when matricule and both name cells are present. Students are not
/// deduplicated here; the caller owns upsert semantics.
pub fn partition_rows(rows: Vec<RosterRow>, normalize_sections: bool) -> Partition {
    let mut partition = Partition::default();
    let mut bucket_index: HashMap<String, usize> = HashMap::new();

    for (offset, row) in rows.into_iter().enumerate() {
        let fields = match extract_fields(&row, normalize_sections) {
            Ok(fields) => fields,
            Err(reason) => {
                trace!(offset, ?reason, "row skipped");
                continue;
            }
        };

        if !partition.sections.contains(&fields.section) {
            partition.sections.push(fields.section.clone());
        }

        let index = match bucket_index.get(&fields.group_key) {
            Some(&index) => index,
            None => {
                partition.groups.push(GroupBucket {
                    key: fields.group_key.clone(),
                    section: fields.section.clone(),
                    rows: Vec::new(),
                });
                bucket_index.insert(fields.group_key.clone(), partition.groups.len() - 1);
                partition.groups.len() - 1
            }
        };

        if !fields.matricule.is_empty()
            && !fields.last_name.is_empty()
            && !fields.first_name.is_empty()
        {
            partition.students.push(Student {
                matricule: fields.matricule.clone(),
                first_name: fields.first_name,
                last_name: fields.last_name,
            });
            partition.memberships.push(StudentGroup {
                matricule: fields.matricule,
                group_name: fields.group_key,
            });
        }

        partition.groups[index].rows.push(row);
    }

    partition
}

fn extract_fields(row: &RosterRow, normalize_sections: bool) -> Result<RowFields, RowSkip> {
    if row.len() <= COL_GROUP {
        return Err(RowSkip::TooShort);
    }

    let matricule = cell_text(&row[COL_MATRICULE]).trim().to_string();
    let last_name = cell_text(&row[COL_LAST_NAME]).trim().to_string();
    let first_name = cell_text(&row[COL_FIRST_NAME]).trim().to_string();
    let mut section = cell_text(&row[COL_SECTION]).trim().to_string();
    let mut group = cell_text(&row[COL_GROUP]).trim().to_string();
    if normalize_sections {
        section = section.to_lowercase();
        group = group.to_lowercase();
    }

    if section.is_empty() {
        return Err(RowSkip::MissingSection);
    }
    if group.is_empty() {
        return Err(RowSkip::MissingGroup);
    }

    let (section, group_key) = if normalize_sections {
        let section = canonical_section(&section);
        let group_key = format!("{}_{}", section, group);
        (section, group_key)
    } else {
        (section, group)
    };

    Ok(RowFields {
        matricule,
        last_name,
        first_name,
        section,
        group_key,
    })
}

/// Collapse the spelling variants of a section label ("section a", "Section
/// A", "A") onto one display form: `Section ` followed by the upper-cased
/// label with any literal "section" substring removed.
fn canonical_section(lowered: &str) -> String {
    let name = match lowered.find("section") {
        Some(index) => {
            let before = &lowered[..index];
            let after = lowered[index + "section".len()..].trim_start();
            format!("{}{}", before, after).trim().to_uppercase()
        }
        None => lowered.to_uppercase(),
    };
    format!("Section {}", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::Data;

    fn row(cells: &[&str]) -> RosterRow {
        cells
            .iter()
            .map(|value| {
                if value.is_empty() {
                    Data::Empty
                } else {
                    Data::String(value.to_string())
                }
            })
            .collect()
    }

    fn student_row(matricule: &str, last: &str, first: &str, section: &str, group: &str) -> RosterRow {
        row(&["1", "", "", matricule, last, first, section, group])
    }

    #[test]
    fn canonical_section_variants() {
        assert_eq!(canonical_section("section a"), "Section A");
        assert_eq!(canonical_section("a"), "Section A");
        assert_eq!(canonical_section("a section"), "Section A");
        assert_eq!(canonical_section("secb"), "Section SECB");
        assert_eq!(canonical_section("section  b2"), "Section B2");
    }

    #[test]
    fn short_and_unlabelled_rows_contribute_nothing() {
        let rows = vec![
            row(&["only", "four", "cells", "here"]),
            student_row("M1", "Doe", "Jane", "", "G1"),
            student_row("M2", "Roe", "Rick", "A", ""),
            Vec::new(),
        ];
        let partition = partition_rows(rows, false);
        assert!(partition.sections.is_empty());
        assert!(partition.groups.is_empty());
        assert!(partition.students.is_empty());
        assert!(partition.memberships.is_empty());
    }

    #[test]
    fn base_variant_preserves_spelling_and_keys_by_group_name() {
        let rows = vec![
            student_row("M1", "Doe", "Jane", "Section A", "G1"),
            student_row("M2", "Roe", "Rick", "section a", "g1"),
        ];
        let partition = partition_rows(rows, false);
        assert_eq!(partition.sections, vec!["Section A", "section a"]);
        let keys: Vec<_> = partition.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["G1", "g1"]);
        assert_eq!(partition.memberships[0].group_name, "G1");
    }

    #[test]
    fn normalized_variant_merges_spelling_variants() {
        let rows = vec![
            student_row("M1", "Doe", "Jane", "Section A", "G1"),
            student_row("M2", "Roe", "Rick", "section a", "g1"),
            student_row("M3", "Poe", "Anna", "b", "G1"),
        ];
        let partition = partition_rows(rows, true);
        assert_eq!(partition.sections, vec!["Section A", "Section B"]);
        let keys: Vec<_> = partition.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["Section A_g1", "Section B_g1"]);
        assert_eq!(partition.groups[0].rows.len(), 2);
        assert_eq!(partition.groups[0].section, "Section A");
        assert_eq!(partition.memberships[0].group_name, "Section A_g1");
        assert_eq!(partition.memberships[2].group_name, "Section B_g1");
    }

    #[test]
    fn rows_without_full_identity_still_count_toward_their_group() {
        let rows = vec![
            student_row("M1", "Doe", "Jane", "A", "G1"),
            student_row("", "Ghost", "Row", "A", "G1"),
            student_row("M3", "", "Solo", "A", "G1"),
        ];
        let partition = partition_rows(rows, false);
        assert_eq!(partition.groups[0].rows.len(), 3);
        assert_eq!(partition.students.len(), 1);
        assert_eq!(partition.students[0].matricule, "M1");
        assert_eq!(partition.memberships.len(), 1);
    }

    #[test]
    fn bucket_totals_match_qualifying_rows() {
        let rows = vec![
            student_row("M1", "Doe", "Jane", "A", "G1"),
            student_row("M2", "Roe", "Rick", "A", "G2"),
            student_row("", "", "", "B", "G1"),
            row(&["short"]),
            student_row("M4", "Poe", "Anna", "", "G9"),
        ];
        let partition = partition_rows(rows, false);
        let total: usize = partition.groups.iter().map(|g| g.rows.len()).sum();
        // Three rows qualify; the short row and the section-less row do not.
        assert_eq!(total, 3);
    }

    #[test]
    fn numeric_matricules_are_stringified() {
        let mut cells = row(&["1", "", "", "", "Doe", "Jane", "A", "G1"]);
        cells[COL_MATRICULE] = Data::Float(20230045.0);
        let partition = partition_rows(vec![cells], false);
        assert_eq!(partition.students[0].matricule, "20230045");
    }

    #[test]
    fn whitespace_only_labels_are_treated_as_missing() {
        let rows = vec![student_row("M1", "Doe", "Jane", "   ", "G1")];
        let partition = partition_rows(rows, true);
        assert!(partition.groups.is_empty());
    }
}
