//! HTTP client wrapper for talking to the OAI-PMH endpoint.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Url;

use crate::error::{HarvesterError, Result};

/// User agent string identifying this harvester.
const USER_AGENT: &str = concat!("pfr-harvester/", env!("CARGO_PKG_VERSION"));

/// Create a configured HTTP client.
///
/// # Returns
/// A `reqwest::blocking::Client` with the given timeout and our user agent.
pub fn create_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// One network round trip returning the response body as text.
///
/// Implementations must treat any non-2xx status as a failure.
pub trait Transport {
    /// Send a GET request with the given query pairs.
    fn get(&self, endpoint: &Url, params: &[(&'static str, String)]) -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, endpoint: &Url, params: &[(&'static str, String)]) -> Result<String> {
        (**self).get(endpoint, params)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn get(&self, endpoint: &Url, params: &[(&'static str, String)]) -> Result<String> {
        (**self).get(endpoint, params)
    }
}

/// Blocking reqwest transport. No retries: a failed round trip is reported
/// to the caller as is.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with its own client.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client(timeout)?,
        })
    }

    /// Wrap an existing client.
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn get(&self, endpoint: &Url, params: &[(&'static str, String)]) -> Result<String> {
        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

        tracing::debug!(url = %url, "requesting archive");

        let fetch_error = |status: Option<u16>, message: String| HarvesterError::Fetch {
            url: endpoint.to_string(),
            status,
            message,
        };

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| fetch_error(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_error(
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("unexpected status").to_string(),
            ));
        }

        response
            .text()
            .map_err(|e| fetch_error(Some(status.as_u16()), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_client() {
        let client = create_client(Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_connection_failure_is_fetch_error() {
        let transport = HttpTransport::new(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on localhost is closed on test machines.
        let endpoint = Url::parse("http://127.0.0.1:9/oai2").unwrap();

        let err = transport
            .get(&endpoint, &[("verb", "ListRecords".to_string())])
            .unwrap_err();
        assert!(matches!(err, HarvesterError::Fetch { status: None, .. }));
    }
}
