mod retry_policy;

pub(crate) use retry_policy::RETRY_MAX_ATTEMPTS;

use std::time::Duration;

use bytes::Bytes;
use futures_util::Stream;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::error::BridgeError;

use self::retry_policy::linear_backoff_delay;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP transport for the upstream provider API.
///
/// Owns connect/read timeouts; the decoder itself never times out. One
/// instance is shared across requests.
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpTransport {
    /// Build a transport with the given User-Agent and total request
    /// timeout in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the underlying client cannot
    /// be constructed.
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(timeout_secs))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| BridgeError::Transport(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// POST a chat-completion request and return the raw SSE byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] on connection failure and
    /// [`BridgeError::Upstream`] (with the response body as the message) on
    /// a non-2xx status. Decoding never starts in either case.
    pub async fn open_chat_stream(
        &self,
        url: &str,
        api_key: &str,
        body: Vec<u8>,
    ) -> Result<impl Stream<Item = Result<Bytes, reqwest::Error>>, BridgeError> {
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {api_key}"))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .header(USER_AGENT, &self.user_agent)
            .body(body)
            .send()
            .await
            .map_err(|err| BridgeError::Transport(format!("chat request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BridgeError::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.bytes_stream())
    }

    /// GET a JSON document, optionally authenticated.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] on connection or decode failure
    /// and [`BridgeError::Upstream`] on a non-2xx status.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<T, BridgeError> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent);
        if let Some(key) = bearer {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        let response = request
            .send()
            .await
            .map_err(|err| BridgeError::Transport(format!("GET {url} failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BridgeError::Upstream {
                status: status.as_u16(),
                message,
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|err| BridgeError::Transport(format!("failed to read {url}: {err}")))?;
        serde_json::from_slice(&body)
            .map_err(|err| BridgeError::Transport(format!("invalid JSON from {url}: {err}")))
    }

    /// GET a JSON document with a fixed retry budget and linear backoff.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error once the budget is exhausted.
    pub async fn get_json_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
        max_attempts: u32,
    ) -> Result<T, BridgeError> {
        let mut attempt = 0;
        loop {
            match self.get_json::<T>(url, bearer).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        return Err(err);
                    }
                    let delay = linear_backoff_delay(attempt);
                    tracing::debug!(
                        url,
                        attempt,
                        "fetch failed: {err}; retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
