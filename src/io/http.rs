use reqwest::blocking::Client;
use reqwest::header::RANGE;
use tracing::debug;

use super::{ByteRange, Response, Transport};
use crate::config::StreamConfig;
use crate::error::Result;

/// Blocking HTTP transport built on a reqwest client.
///
/// Redirects are followed with reqwest's default policy, so a probe of a
/// redirecting URL reports the final resource.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client with the timeouts and User-Agent from `config`.
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for HttpTransport {
    fn head(&self, url: &str) -> Result<Response> {
        let resp = self.client.head(url).send()?;
        debug!(url, status = %resp.status(), "HEAD");
        Ok(Response {
            status: resp.status(),
            headers: resp.headers().clone(),
            body: Box::new(std::io::empty()),
        })
    }

    fn get_range(&self, url: &str, range: ByteRange) -> Result<Response> {
        let resp = self
            .client
            .get(url)
            .header(RANGE, range.to_string())
            .send()?;
        debug!(url, %range, status = %resp.status(), "GET");
        Ok(Response {
            status: resp.status(),
            headers: resp.headers().clone(),
            body: Box::new(resp),
        })
    }
}
