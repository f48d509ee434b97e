use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::CanonicalError;

use super::retry_policy::RetryPolicy;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const ERROR_BODY_PREVIEW_BYTES: usize = 512;

fn build_reqwest_client(
    config: &ServerConfig,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, CanonicalError> {
    let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
    };

    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(config.http_pool_max_idle_per_host.max(1))
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .read_timeout(Duration::from_secs(config.timeout));

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| CanonicalError::Config(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !config.http_use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| CanonicalError::Config(format!("Failed to build HTTP client: {err}")))
}

/// Join a backend base URL and an endpoint path.
///
/// # Errors
///
/// Returns [`CanonicalError::Config`] when the result is not a valid URL.
pub fn endpoint_url(base_url: &str, path: &str) -> Result<url::Url, CanonicalError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url::Url::parse(&joined)
        .map_err(|e| CanonicalError::Config(format!("Invalid upstream URL '{joined}': {e}")))
}

/// HTTP transport shared by every session talking to the configured backend.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl HttpTransport {
    /// Build the pooled client from the server config and the backend proxy.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::Config`] when the proxy URL or client
    /// settings are rejected.
    pub fn new(config: &ServerConfig, proxy_url: Option<&str>) -> Result<Self, CanonicalError> {
        Ok(Self {
            client: build_reqwest_client(config, proxy_url)?,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(config.timeout),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// POST a JSON body whose whole response, body included, must arrive
    /// within `server.timeout`.
    ///
    /// Retriable statuses and transient transport failures are retried with
    /// the same body before any response reaches the caller.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError::Transport`] when the request cannot be sent
    /// or times out and [`CanonicalError::Upstream`] for a non-success status.
    pub async fn post_json(
        &self,
        url: &url::Url,
        headers: http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, CanonicalError> {
        self.send_with_retry(url, headers, body, Some(self.request_timeout))
            .await
    }

    /// POST a JSON body and return a response whose body is streamed.
    ///
    /// No total deadline applies; only a gap longer than `server.timeout`
    /// between two reads fails the body stream.
    ///
    /// # Errors
    ///
    /// Same as [`HttpTransport::post_json`].
    pub async fn post_json_streaming(
        &self,
        url: &url::Url,
        headers: http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, CanonicalError> {
        self.send_with_retry(url, headers, body, None).await
    }

    async fn send_with_retry(
        &self,
        url: &url::Url,
        headers: http::HeaderMap,
        body: bytes::Bytes,
        total_timeout: Option<Duration>,
    ) -> Result<reqwest::Response, CanonicalError> {
        let mut attempt = 0;
        loop {
            let mut request = self
                .client
                .post(url.clone())
                .headers(headers.clone())
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(body.clone());
            if let Some(timeout) = total_timeout {
                request = request.timeout(timeout);
            }
            let result = request.send().await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if self.retry.allows(attempt) && RetryPolicy::should_retry_status(status) {
                        let delay = self.retry.status_delay(response.headers(), attempt);
                        tracing::debug!(
                            status = status.as_u16(),
                            retry_attempt = attempt + 1,
                            delay_ms = delay.as_millis(),
                            "retrying upstream request after retriable status"
                        );
                        drop(response);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return ensure_success(response).await;
                }
                Err(err) => {
                    let message = err.to_string();
                    if !self.retry.allows(attempt) || !RetryPolicy::should_retry_transport(&message)
                    {
                        return Err(CanonicalError::Transport(message));
                    }
                    let delay = self.retry.transport_delay(&message, attempt);
                    tracing::debug!(
                        retry_attempt = attempt + 1,
                        delay_ms = delay.as_millis(),
                        error = %message,
                        "retrying upstream request after transport error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CanonicalError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let preview_len = body.len().min(ERROR_BODY_PREVIEW_BYTES);
    let message = String::from_utf8_lossy(&body[..preview_len]).into_owned();
    Err(CanonicalError::Upstream {
        status: status.as_u16(),
        message,
    })
}
