use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::identimetrics::downloader::auth::AccessToken;
use crate::identimetrics::downloader::client::{self, ApiTransport};
use crate::identimetrics::downloader::error::{DownloaderError, Result};
use crate::identimetrics::downloader::model::{Record, RecordKind};

/// Runs the PowerQuery for `kind` and returns its records in server order.
#[instrument(level = "info", skip_all, fields(%kind))]
pub fn fetch_records<T: ApiTransport + ?Sized>(
    transport: &T,
    base_url: &str,
    token: &AccessToken,
    kind: RecordKind,
) -> Result<Vec<Record>> {
    info!("downloading {kind}");
    let response = transport.post_json(
        &client::query_url(base_url, kind),
        &token.bearer_header(),
        &json!({}),
    )?;
    let records = extract_records(response)?;
    info!(record_count = records.len(), "downloaded {kind}");
    Ok(records)
}

/// Pulls the `record` collection out of a PowerQuery response.
pub fn extract_records(response: Value) -> Result<Vec<Record>> {
    let Value::Object(mut body) = response else {
        return Err(DownloaderError::MissingRecords);
    };
    let collection = body
        .remove("record")
        .ok_or(DownloaderError::MissingRecords)?;
    let Value::Array(items) = collection else {
        return Err(DownloaderError::InvalidRecords(
            "'record' is not an array".into(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            _ => Err(DownloaderError::InvalidRecords(format!(
                "record {index} is not a JSON object"
            ))),
        })
        .collect()
}
