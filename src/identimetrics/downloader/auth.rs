//! OAuth client-credentials exchange.
//!
//! PowerSchool plugins authenticate by sending `client_id:client_secret` as
//! an HTTP Basic credential to the token endpoint. The returned token is kept
//! for the lifetime of the process only.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{info, instrument};

use crate::identimetrics::downloader::client::{self, ApiTransport};
use crate::identimetrics::downloader::config::Settings;
use crate::identimetrics::downloader::error::{DownloaderError, Result};

const GRANT_BODY: &str = "grant_type=client_credentials";

/// Bearer token obtained once per run.
#[derive(Debug)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// `Authorization` header value for PowerQuery calls.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0.expose_secret())
    }
}

/// Base64 of `client_id:client_secret`, as used in the Basic header.
pub fn basic_credential(client_id: &str, client_secret: &str) -> String {
    STANDARD.encode(format!("{client_id}:{client_secret}"))
}

/// Exchanges the configured client credentials for an access token.
#[instrument(level = "info", skip_all, fields(server = %settings.api_url))]
pub fn authenticate<T: ApiTransport + ?Sized>(
    transport: &T,
    settings: &Settings,
) -> Result<AccessToken> {
    info!("authenticating with PowerSchool");
    let credential = basic_credential(&settings.client_id, settings.client_secret.expose_secret());
    let response = transport.post_form(
        &client::token_url(&settings.api_url),
        &format!("Basic {credential}"),
        GRANT_BODY,
    )?;
    let token = extract_token(&response)?;
    info!("authenticated with PowerSchool");
    Ok(token)
}

fn extract_token(response: &Value) -> Result<AccessToken> {
    response
        .get("access_token")
        .and_then(Value::as_str)
        .map(AccessToken::new)
        .ok_or(DownloaderError::MissingToken)
}
