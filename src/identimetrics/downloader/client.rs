//! Outbound HTTP for the PowerSchool API.
//!
//! The pipeline only needs two request shapes: a form-encoded POST for the
//! OAuth token exchange and a JSON POST for PowerQuery calls. Both sit behind
//! [`ApiTransport`] so the stages can be exercised without a network.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use tracing::debug;

use crate::identimetrics::downloader::error::{DownloaderError, Result};
use crate::identimetrics::downloader::model::RecordKind;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Request primitives used by the authentication and fetch stages.
///
/// `authorization` is the complete `Authorization` header value.
pub trait ApiTransport {
    /// POSTs a form-encoded body and returns the parsed JSON response.
    fn post_form(&self, url: &str, authorization: &str, body: &str) -> Result<Value>;

    /// POSTs a JSON body and returns the parsed JSON response.
    fn post_json(&self, url: &str, authorization: &str, body: &Value) -> Result<Value>;
}

/// Token endpoint below the configured base URL.
pub fn token_url(base_url: &str) -> String {
    format!("{base_url}/oauth/access_token/")
}

/// PowerQuery endpoint for a record kind, requesting a single unbounded page.
pub fn query_url(base_url: &str, kind: RecordKind) -> String {
    format!("{base_url}/ws/schema/query/{}?pagesize=0", kind.query_name())
}

/// Blocking `reqwest` implementation of [`ApiTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn send(&self, url: &str, request: RequestBuilder) -> Result<Value> {
        let response = request.send()?;
        let status = response.status();
        debug!(url, status = status.as_u16(), "received response");
        if !status.is_success() {
            return Err(DownloaderError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl ApiTransport for HttpTransport {
    fn post_form(&self, url: &str, authorization: &str, body: &str) -> Result<Value> {
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header(AUTHORIZATION, authorization)
            .body(body.to_string());
        self.send(url, request)
    }

    fn post_json(&self, url: &str, authorization: &str, body: &Value) -> Result<Value> {
        let request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(ACCEPT, JSON_CONTENT_TYPE)
            .header(AUTHORIZATION, authorization)
            .json(body);
        self.send(url, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_follow_powerschool_paths() {
        assert_eq!(
            token_url("https://ps.example.test"),
            "https://ps.example.test/oauth/access_token/"
        );
        assert_eq!(
            query_url("https://ps.example.test", RecordKind::Staff),
            "https://ps.example.test/ws/schema/query/us.ct.k12.tolland.identimetrics.staff.get_import_data?pagesize=0"
        );
    }
}
