//! Remote asset transport
//!
//! [`Fetcher`] is the seam between the normalizer and the network. The
//! default [`HttpFetcher`] issues blocking GETs and follows redirects itself
//! so the hop budget and relative `Location` handling stay under our control.

use std::io::Write;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};

use crate::config::NetworkConfig;
use crate::error::IconError;

/// Streams a remote resource into a writer.
pub trait Fetcher: Send + Sync {
    /// Write the body of a successful response for `url` to `out`.
    ///
    /// Returns the number of bytes written. An empty body is an error.
    fn fetch_to(&self, url: &str, out: &mut dyn Write) -> Result<u64, IconError>;
}

/// Remote URL of asset `id` with the given extension.
///
/// # Examples
///
/// ```
/// use pixelicons::fetch::asset_url;
///
/// assert_eq!(asset_url("https://host/icons/", "2389", "gif"), "https://host/icons/2389.gif");
/// ```
pub fn asset_url(base_url: &str, id: &str, ext: &str) -> String {
    format!("{}{}.{}", base_url, id, ext)
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Blocking HTTP(S) fetcher backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_redirects: u32,
}

impl HttpFetcher {
    pub fn new(config: &NetworkConfig) -> Result<Self, reqwest::Error> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(timeout)
            .timeout(timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            max_redirects: config.max_redirects,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_to(&self, url: &str, out: &mut dyn Write) -> Result<u64, IconError> {
        let mut current =
            Url::parse(url).map_err(|e| IconError::NetworkFailure(format!("invalid URL '{}': {}", url, e)))?;
        let mut hops = 0;

        loop {
            let mut response = self.client.get(current.clone()).send()?;
            let status = response.status();

            if is_redirect(status) {
                if hops >= self.max_redirects {
                    return Err(IconError::NetworkFailure(format!(
                        "gave up on {} after {} redirects",
                        url, hops
                    )));
                }
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| {
                        IconError::NetworkFailure(format!("HTTP {} from {} without Location", status.as_u16(), current))
                    })?;
                let next = current.join(location).map_err(|e| {
                    IconError::NetworkFailure(format!("bad redirect target '{}': {}", location, e))
                })?;
                log::debug!("redirect {} -> {}", current, next);
                current = next;
                hops += 1;
                continue;
            }

            if status != StatusCode::OK {
                return Err(IconError::NetworkFailure(format!("HTTP {} from {}", status.as_u16(), current)));
            }

            let written = response.copy_to(out)?;
            if written == 0 {
                return Err(IconError::NetworkFailure(format!("empty body from {}", current)));
            }
            return Ok(written);
        }
    }
}
