//! Azure-style blob container over HTTP.
//!
//! Requests are `GET`/`PUT {base_url}{blob}{query_string}`, where the query
//! string is the container's SAS credential. Conditional writes use the
//! `ETag` returned by the container.

use fwrel_release::{Blob, BlobTransport, TransportError, WriteCondition};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, ETAG, HeaderValue, IF_MATCH, IF_NONE_MATCH};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::debug;

const MS_VERSION: &str = "2020-04-08";

/// Blob transport for an HTTP container.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    query_string: SecretString,
    timeout: Duration,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Creates a transport for the container at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns the client construction error, e.g. when no TLS provider is
    /// installed.
    pub fn new(
        base_url: impl Into<String>,
        query_string: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            query_string,
            timeout,
        })
    }

    fn url(&self, name: &str) -> String {
        blob_url(&self.base_url, name, self.query_string.expose_secret())
    }

    fn request_error(&self, err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else {
            // The URL carries the credential
            TransportError::Unavailable(err.without_url().to_string())
        }
    }
}

/// Full request URL for `name`.
#[must_use]
pub fn blob_url(base_url: &str, name: &str, query_string: &str) -> String {
    format!("{base_url}{name}{query_string}")
}

/// Maps a response status to a transport failure, or `None` for success.
#[must_use]
pub fn classify_status(status: StatusCode) -> Option<TransportError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND => TransportError::NotFound,
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            TransportError::PreconditionFailed
        }
        other => TransportError::Unavailable(format!("HTTP {other}")),
    })
}

fn etag_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(ETAG)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

impl BlobTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn get(&self, name: &str) -> Result<Blob, TransportError> {
        debug!(blob = %name, "GET blob");
        let response = self
            .client
            .get(self.url(name))
            .send()
            .map_err(|e| self.request_error(e))?;

        if let Some(err) = classify_status(response.status()) {
            debug!(blob = %name, status = %response.status(), "GET failed");
            return Err(err);
        }

        let etag = etag_of(&response);
        let bytes = response.bytes().map_err(|e| self.request_error(e))?;
        let blob = Blob::new(bytes.to_vec());
        Ok(match etag {
            Some(tag) => blob.with_etag(tag),
            None => blob,
        })
    }

    fn put(
        &self,
        name: &str,
        bytes: &[u8],
        condition: &WriteCondition,
    ) -> Result<Option<String>, TransportError> {
        debug!(blob = %name, size = bytes.len(), ?condition, "PUT blob");
        let mut request = self
            .client
            .put(self.url(name))
            .header("x-ms-version", MS_VERSION)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header("x-ms-blob-type", "BlockBlob");

        match condition {
            WriteCondition::None => {}
            WriteCondition::IfMatch(tag) => {
                let value = HeaderValue::from_str(tag)
                    .map_err(|e| TransportError::Unavailable(format!("invalid ETag: {e}")))?;
                request = request.header(IF_MATCH, value);
            }
            WriteCondition::IfAbsent => {
                request = request.header(IF_NONE_MATCH, "*");
            }
        }

        let response = request
            .body(bytes.to_vec())
            .send()
            .map_err(|e| self.request_error(e))?;

        if let Some(err) = classify_status(response.status()) {
            debug!(blob = %name, status = %response.status(), "PUT failed");
            return Err(err);
        }
        Ok(etag_of(&response))
    }
}
