use serde_json::Value;

use crate::identimetrics::downloader::model::Record;

/// Removes every comma from the string fields of `records`.
///
/// Rows are written comma-delimited without quoting, so no field may carry a
/// comma into the export.
pub fn strip_commas(records: &mut [Record]) {
    for record in records {
        for value in record.values_mut() {
            if let Value::String(text) = value {
                text.retain(|ch| ch != ',');
            }
        }
    }
}
