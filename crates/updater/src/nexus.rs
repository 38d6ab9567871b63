//! HTTP implementation of [`Backend`] for Sonatype Nexus raw repositories.
//!
//! Any object store that speaks plain GET/PUT/HEAD with optional Basic auth
//! works; Nexus is simply the deployment target this was written against.

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use futures::StreamExt;
use reqwest::{Method, StatusCode};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::backend::{Backend, ByteStream, OpenBody};
use crate::error::{Result, UpdaterError};

/// Per-attempt request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Total retry budget per operation.
const RETRY_BUDGET: Duration = Duration::from_secs(30);

/// Backend talking to a Nexus raw repository over HTTP.
pub struct NexusBackend {
    base_url: String,
    username: String,
    password: String,
    client: reqwest::Client,
}

impl NexusBackend {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Issue one request per attempt under the shared retry policy.
    ///
    /// Returns the first response whose status is not retryable; the caller
    /// decides which statuses are acceptable for its operation.
    async fn execute_with_retry(
        &self,
        method: Method,
        url: &str,
        body: Option<&OpenBody>,
        content_type: &str,
    ) -> Result<reqwest::Response> {
        let policy = ExponentialBackoff {
            max_elapsed_time: Some(RETRY_BUDGET),
            ..ExponentialBackoff::default()
        };
        let attempt = AtomicU32::new(0);

        backoff::future::retry(policy, || async {
            let n = attempt.fetch_add(1, Ordering::Relaxed) + 1;

            let mut request = self
                .client
                .request(method.clone(), url)
                .timeout(REQUEST_TIMEOUT);
            if let Some(body) = body {
                let stream = body.open().map_err(|err| {
                    backoff::Error::permanent(UpdaterError::Io(err))
                })?;
                request = request.body(reqwest::Body::wrap_stream(stream));
            }
            if !self.username.is_empty() {
                request = request.basic_auth(&self.username, Some(&self.password));
            }
            if !content_type.is_empty() {
                request = request.header(reqwest::header::CONTENT_TYPE, content_type);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    if is_retryable_error(&err) {
                        debug!(%url, attempt = n, error = %err, "retrying after transport error");
                        return Err(backoff::Error::transient(UpdaterError::Http(err)));
                    }
                    return Err(backoff::Error::permanent(UpdaterError::Http(err)));
                }
            };

            let status = response.status();
            if is_retryable_status(status) {
                debug!(%url, attempt = n, status = status.as_u16(), "retrying after server error");
                return Err(backoff::Error::transient(UpdaterError::BackendStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                }));
            }

            Ok(response)
        })
        .await
    }
}

/// Transport errors worth retrying: timeouts, refused connections, and
/// resets or truncation mid-exchange.
fn is_retryable_error(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(inner) = source {
        let text = inner.to_string();
        if text.contains("connection reset")
            || text.contains("broken pipe")
            || text.contains("unexpected end of file")
            || text.contains("IncompleteMessage")
        {
            return true;
        }
        source = inner.source();
    }
    false
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl Backend for NexusBackend {
    async fn get(&self, path: &str) -> Result<ByteStream> {
        let url = self.url_for(path);
        let response = self
            .execute_with_retry(Method::GET, &url, None, "")
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(UpdaterError::BackendStatus { status: status.as_u16(), url });
        }
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(UpdaterError::Http))
            .boxed())
    }

    async fn put(&self, path: &str, body: &OpenBody, content_type: &str) -> Result<()> {
        let url = self.url_for(path);
        let response = self
            .execute_with_retry(Method::PUT, &url, Some(body), content_type)
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => Ok(()),
            _ => Err(UpdaterError::BackendStatus { status: status.as_u16(), url }),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let url = self.url_for(path);
        let response = self
            .execute_with_retry(Method::HEAD, &url, None, "")
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(UpdaterError::BackendStatus { status: status.as_u16(), url }),
        }
    }
}
