use std::fmt;

use serde_json::{Map, Value};

/// A single person as returned by a PowerSchool query: field name → JSON value.
pub type Record = Map<String, Value>;

/// Field holding the school abbreviation of a record.
pub const SCHOOL_FIELD: &str = "abbreviation";
/// Field holding the optional middle name of a record.
pub const MIDDLE_NAME_FIELD: &str = "middle_name";

/// The two entity kinds exported by the downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Student,
    Staff,
}

/// One column of an export row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Field that must be present on the record.
    Required(&'static str),
    /// Field that must be present and non-empty.
    Identity(&'static str),
    /// Field that may be absent; absence is written as an empty cell.
    Optional(&'static str),
    /// The configured staff label (`staff_level_2`).
    StaffLabel,
}

const STUDENT_COLUMNS: [Column; 7] = [
    Column::Identity("last_name"),
    Column::Identity("first_name"),
    Column::Optional(MIDDLE_NAME_FIELD),
    Column::Identity("student_number"),
    Column::Required(SCHOOL_FIELD),
    Column::Required("grade_level"),
    Column::Required(SCHOOL_FIELD),
];

const STAFF_COLUMNS: [Column; 7] = [
    Column::Identity("last_name"),
    Column::Identity("first_name"),
    Column::Optional(MIDDLE_NAME_FIELD),
    Column::Identity("teachernumber"),
    Column::Required(SCHOOL_FIELD),
    Column::StaffLabel,
    Column::Required(SCHOOL_FIELD),
];

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Student, RecordKind::Staff];

    /// Plural lower-case label used for file names and log messages.
    pub fn label(self) -> &'static str {
        match self {
            RecordKind::Student => "students",
            RecordKind::Staff => "staff",
        }
    }

    /// Capitalised singular label, as used in the download error messages.
    pub fn title(self) -> &'static str {
        match self {
            RecordKind::Student => "Student",
            RecordKind::Staff => "Staff",
        }
    }

    /// Name of the PowerQuery published by the Identimetrics plugin.
    pub fn query_name(self) -> &'static str {
        match self {
            RecordKind::Student => "us.ct.k12.tolland.identimetrics.students.get_import_data",
            RecordKind::Staff => "us.ct.k12.tolland.identimetrics.staff.get_import_data",
        }
    }

    /// Export file name inside the export directory.
    pub fn file_name(self) -> String {
        format!("{}.csv", self.label())
    }

    /// Fixed column layout of one export row.
    pub fn columns(self) -> &'static [Column] {
        match self {
            RecordKind::Student => &STUDENT_COLUMNS,
            RecordKind::Staff => &STAFF_COLUMNS,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns the textual value of a field, or `None` when it is absent or null.
///
/// Numbers and booleans are rendered as their JSON text so that servers which
/// emit `grade_level` as a number still export cleanly.
pub fn field_text(record: &Record, field: &str) -> Option<String> {
    match record.get(field)? {
        Value::String(value) => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn layouts_repeat_the_school_code_in_the_last_column() {
        for kind in RecordKind::ALL {
            let columns = kind.columns();
            assert_eq!(columns.len(), 7);
            assert_eq!(columns[4], Column::Required(SCHOOL_FIELD));
            assert_eq!(columns[6], Column::Required(SCHOOL_FIELD));
        }
    }

    #[test]
    fn field_text_renders_scalars() {
        let record = json!({"name": "Ann", "grade_level": 5, "active": true, "gone": null});
        let record = record.as_object().expect("object").clone();

        assert_eq!(field_text(&record, "name").as_deref(), Some("Ann"));
        assert_eq!(field_text(&record, "grade_level").as_deref(), Some("5"));
        assert_eq!(field_text(&record, "active").as_deref(), Some("true"));
        assert_eq!(field_text(&record, "gone"), None);
        assert_eq!(field_text(&record, "absent"), None);
    }
}
