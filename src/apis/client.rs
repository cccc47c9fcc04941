/// Base HTTP client shared by API implementations
use reqwest::Client;
use std::time::Duration;

use crate::errors::FetchError;

/// HTTP client wrapper with a uniform request timeout
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout_secs: u64) -> Result<Self, String> {
        let client = Client::builder()
            .user_agent("coinwatch/0.1")
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Map a transport-level reqwest failure onto the fetch taxonomy.
/// Timeouts, connection failures and protocol errors are all transient from
/// the caller's point of view.
pub fn classify_transport_error(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Unavailable("request timed out".to_string())
    } else if err.is_connect() {
        FetchError::Unavailable(format!("connection failed: {}", err))
    } else {
        FetchError::Unavailable(err.to_string())
    }
}

/// Map an HTTP status onto the fetch taxonomy. Success statuses return None.
pub fn classify_status(status: reqwest::StatusCode) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    if status.as_u16() == 429 {
        return Some(FetchError::RateLimited);
    }
    Some(FetchError::Unavailable(format!("HTTP {}", status)))
}
