//! CSV export of one record collection.
//!
//! Rows follow the fixed seven-column layout of the record kind, without a
//! header and without quoting; commas are expected to have been stripped
//! already. A previous export is kept by renaming it with a timestamp before
//! the new file is created in its place.

use std::collections::BTreeSet;
use std::fs;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::{QuoteStyle, WriterBuilder};
use tracing::{debug, info, instrument};

use crate::identimetrics::downloader::config::Settings;
use crate::identimetrics::downloader::error::{DownloaderError, Result};
use crate::identimetrics::downloader::model::{
    Column, Record, RecordKind, SCHOOL_FIELD, field_text,
};

/// `strftime` pattern appended to backup file names.
pub const BACKUP_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Everything needed to export one record kind.
#[derive(Debug, Clone, Copy)]
pub struct ExportJob<'a> {
    pub kind: RecordKind,
    pub records: &'a [Record],
    pub skip_schools: &'a BTreeSet<String>,
    pub staff_label: &'a str,
}

impl<'a> ExportJob<'a> {
    pub fn new(kind: RecordKind, records: &'a [Record], settings: &'a Settings) -> Self {
        Self {
            kind,
            records,
            skip_schools: settings.skip_schools(kind),
            staff_label: &settings.staff_level_2,
        }
    }
}

/// Result of a completed export.
#[derive(Debug)]
pub struct ExportSummary {
    pub path: PathBuf,
    /// Where the previous export was moved, if there was one.
    pub backup: Option<PathBuf>,
    pub written: usize,
    /// Records left out because their school is in the skip-set.
    pub skipped: usize,
    /// Records left out because they failed the layout checks.
    pub rejected: Vec<DownloaderError>,
}

/// Path of the backup for `kind` taken at `stamp`.
pub fn backup_path(dir: &Path, kind: RecordKind, stamp: NaiveDateTime) -> PathBuf {
    dir.join(format!(
        "{}-{}.csv",
        kind.label(),
        stamp.format(BACKUP_STAMP_FORMAT)
    ))
}

/// Writes `job.records` to `<dir>/<kind>.csv`, backing up any previous file.
#[instrument(
    level = "info",
    skip_all,
    fields(kind = %job.kind, dir = %dir.display())
)]
pub fn export_records(
    dir: &Path,
    job: &ExportJob<'_>,
    stamp: NaiveDateTime,
) -> Result<ExportSummary> {
    info!("writing {}", job.kind);
    let path = dir.join(job.kind.file_name());

    let backup = if path.exists() {
        let target = backup_path(dir, job.kind, stamp);
        fs::rename(&path, &target)?;
        info!(backup = %target.display(), "previous export backed up");
        Some(target)
    } else {
        None
    };

    fs::create_dir_all(dir)?;
    let file = File::create(&path)?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(BufWriter::new(file));

    let mut written = 0;
    let mut skipped = 0;
    let mut rejected = Vec::new();

    for (index, record) in job.records.iter().enumerate() {
        let Some(school) = field_text(record, SCHOOL_FIELD) else {
            rejected.push(DownloaderError::MissingField {
                index,
                field: SCHOOL_FIELD.to_string(),
            });
            continue;
        };

        if job.skip_schools.contains(&school.to_uppercase()) {
            info!(
                school = %school,
                "skipping {} record from skipped school",
                job.kind.title()
            );
            skipped += 1;
            continue;
        }

        match render_row(job, index, record) {
            Ok(row) => {
                writer.write_record(&row)?;
                written += 1;
            }
            Err(err) => rejected.push(err),
        }
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|err| DownloaderError::Io(err.into_error()))?
        .into_inner()
        .map_err(|err| DownloaderError::Io(err.into_error()))?
        .sync_all()?;

    debug!(written, skipped, rejected = rejected.len(), "export finished");
    Ok(ExportSummary {
        path,
        backup,
        written,
        skipped,
        rejected,
    })
}

/// Builds the cells of one row according to the kind's column layout.
pub fn render_row(job: &ExportJob<'_>, index: usize, record: &Record) -> Result<Vec<String>> {
    job.kind
        .columns()
        .iter()
        .map(|column| match *column {
            Column::Identity(field) => {
                let value = required(record, index, field)?;
                if value.trim().is_empty() {
                    return Err(DownloaderError::EmptyField {
                        index,
                        field: field.to_string(),
                    });
                }
                Ok(value)
            }
            Column::Required(field) => required(record, index, field),
            Column::Optional(field) => Ok(field_text(record, field).unwrap_or_default()),
            Column::StaffLabel => Ok(job.staff_label.to_string()),
        })
        .collect()
}

fn required(record: &Record, index: usize, field: &str) -> Result<String> {
    field_text(record, field).ok_or_else(|| DownloaderError::MissingField {
        index,
        field: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::{Value, json};
    use tempfile::tempdir;

    fn records(value: Value) -> Vec<Record> {
        value
            .as_array()
            .expect("array")
            .iter()
            .map(|item| item.as_object().expect("object").clone())
            .collect()
    }

    fn schools(codes: &[&str]) -> BTreeSet<String> {
        codes.iter().map(|code| code.to_string()).collect()
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .and_then(|date| date.and_hms_opt(8, 30, 5))
            .expect("valid timestamp")
    }

    #[test]
    fn student_rows_follow_layout_and_skip_set() {
        let data = records(json!([
            {"last_name": "Doe", "first_name": "Jane", "student_number": "123", "abbreviation": "abc", "grade_level": "5"},
            {"last_name": "Roe", "first_name": "Rick", "student_number": "456", "abbreviation": "XYZ", "grade_level": "6"}
        ]));
        let skip = schools(&["XYZ"]);
        let job = ExportJob {
            kind: RecordKind::Student,
            records: &data,
            skip_schools: &skip,
            staff_label: "Staff",
        };
        let dir = tempdir().expect("temporary directory");

        let summary = export_records(dir.path(), &job, stamp()).expect("export succeeded");

        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.rejected.is_empty());
        assert_eq!(summary.backup, None);
        let written = fs::read_to_string(dir.path().join("students.csv")).expect("students read");
        assert_eq!(written, "Doe,Jane,,123,abc,5,abc\n");
    }

    #[test]
    fn skip_set_matches_case_insensitively() {
        let data = records(json!([
            {"last_name": "Poe", "first_name": "Ed", "middle_name": "A", "teachernumber": "9", "abbreviation": "dis"},
            {"last_name": "Low", "first_name": "Al", "teachernumber": "10", "abbreviation": "HS"}
        ]));
        let skip = schools(&["DIS"]);
        let job = ExportJob {
            kind: RecordKind::Staff,
            records: &data,
            skip_schools: &skip,
            staff_label: "Faculty",
        };
        let dir = tempdir().expect("temporary directory");

        export_records(dir.path(), &job, stamp()).expect("export succeeded");

        let written = fs::read_to_string(dir.path().join("staff.csv")).expect("staff read");
        assert_eq!(written, "Low,Al,,10,HS,Faculty,HS\n");
    }

    #[test]
    fn invalid_records_are_rejected_without_stopping_the_export() {
        let data = records(json!([
            {"last_name": "Kay", "first_name": "Lu", "student_number": "1", "grade_level": "2"},
            {"last_name": "", "first_name": "Mo", "student_number": "2", "abbreviation": "MS", "grade_level": "7"},
            {"last_name": "Ng", "first_name": "Jo", "student_number": 3, "abbreviation": "MS", "grade_level": 8}
        ]));
        let skip = BTreeSet::new();
        let job = ExportJob {
            kind: RecordKind::Student,
            records: &data,
            skip_schools: &skip,
            staff_label: "Staff",
        };
        let dir = tempdir().expect("temporary directory");

        let summary = export_records(dir.path(), &job, stamp()).expect("export succeeded");

        assert_eq!(summary.written, 1);
        assert_eq!(summary.rejected.len(), 2);
        assert!(matches!(
            &summary.rejected[0],
            DownloaderError::MissingField { index: 0, field } if field == "abbreviation"
        ));
        assert!(matches!(
            &summary.rejected[1],
            DownloaderError::EmptyField { index: 1, field } if field == "last_name"
        ));
        let written = fs::read_to_string(dir.path().join("students.csv")).expect("students read");
        assert_eq!(written, "Ng,Jo,,3,MS,8,MS\n");
    }

    #[test]
    fn previous_export_is_backed_up_with_timestamp() {
        let dir = tempdir().expect("temporary directory");
        let path = dir.path().join("students.csv");
        fs::write(&path, "Old,Row,,1,HS,9,HS\n").expect("previous export written");

        let data = records(json!([
            {"last_name": "New", "first_name": "Row", "student_number": "2", "abbreviation": "HS", "grade_level": "10"}
        ]));
        let skip = BTreeSet::new();
        let job = ExportJob {
            kind: RecordKind::Student,
            records: &data,
            skip_schools: &skip,
            staff_label: "Staff",
        };

        let summary = export_records(dir.path(), &job, stamp()).expect("export succeeded");

        let backup = dir.path().join("students-20261019-083005.csv");
        assert_eq!(summary.backup.as_deref(), Some(backup.as_path()));
        assert_eq!(
            fs::read_to_string(&backup).expect("backup read"),
            "Old,Row,,1,HS,9,HS\n"
        );
        assert_eq!(
            fs::read_to_string(&path).expect("export read"),
            "New,Row,,2,HS,10,HS\n"
        );
        let file_count = fs::read_dir(dir.path()).expect("directory listed").count();
        assert_eq!(file_count, 2);
    }

    #[test]
    fn missing_directory_is_created_and_empty_collection_writes_empty_file() {
        let dir = tempdir().expect("temporary directory");
        let target = dir.path().join("nested").join("exports");
        let skip = BTreeSet::new();
        let job = ExportJob {
            kind: RecordKind::Staff,
            records: &[],
            skip_schools: &skip,
            staff_label: "Staff",
        };

        let summary = export_records(&target, &job, stamp()).expect("export succeeded");

        assert_eq!(summary.written, 0);
        assert_eq!(fs::read_to_string(target.join("staff.csv")).expect("staff read"), "");
    }

    #[cfg(unix)]
    #[test]
    fn exported_files_get_the_regular_create_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().expect("temporary directory");
        let skip = BTreeSet::new();
        let job = ExportJob {
            kind: RecordKind::Student,
            records: &[],
            skip_schools: &skip,
            staff_label: "Staff",
        };
        export_records(dir.path(), &job, stamp()).expect("first export");
        export_records(dir.path(), &job, stamp()).expect("second export");

        let reference = dir.path().join("reference.txt");
        File::create(&reference).expect("reference file created");
        let mode = |path: &Path| {
            fs::metadata(path)
                .expect("metadata read")
                .permissions()
                .mode()
                & 0o777
        };

        let expected = mode(&reference);
        assert_eq!(mode(&dir.path().join("students.csv")), expected);
        let backup = backup_path(dir.path(), RecordKind::Student, stamp());
        assert_eq!(mode(&backup), expected);
    }
}
