use std::io::Read;

use bytes::Bytes;
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::{Body, ByteRange, Transport};
use crate::error::{Result, StreamError};

/// Upper bound on the up-front allocation for one response body.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// Request and byte counters for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Ranged requests issued, including sequential-mode connections.
    pub requests: u64,
    /// Body bytes received.
    pub bytes: u64,
}

/// Issues ranged requests for a single URL.
///
/// Every request must be answered with `206 Partial Content`; a `200 OK`
/// means the server ignored the range and is rejected like any other status.
/// There is no retry here.
#[derive(Debug)]
pub struct RangeFetcher<T> {
    transport: T,
    url: String,
    stats: TransferStats,
}

impl<T: Transport> RangeFetcher<T> {
    pub fn new(transport: T, url: impl Into<String>) -> Self {
        Self {
            transport,
            url: url.into(),
            stats: TransferStats::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    /// Record bytes received outside [`fetch`](Self::fetch), i.e. from a
    /// sequential-mode body.
    pub(crate) fn add_received(&mut self, n: usize) {
        self.stats.bytes += n as u64;
    }

    /// Fetch `[start, end_inclusive]` and return whatever the server sent.
    ///
    /// The body may be shorter than requested; callers loop.
    pub fn fetch(&mut self, start: u64, end_inclusive: u64) -> Result<Bytes> {
        let range = ByteRange::bounded(start, end_inclusive);
        let mut body = self.open(range)?;

        let expected = end_inclusive - start + 1;
        let mut buf = Vec::with_capacity(expected.min(MAX_PREALLOC) as usize);
        body.read_to_end(&mut buf)
            .map_err(StreamError::connectivity)?;
        self.stats.bytes += buf.len() as u64;

        if (buf.len() as u64) < expected {
            warn!(%range, received = buf.len(), expected, "short partial response");
        } else {
            debug!(%range, received = buf.len(), "range fetched");
        }
        Ok(Bytes::from(buf))
    }

    /// Open a streamed connection for `bytes=<start>-`.
    pub fn open_from(&mut self, start: u64) -> Result<Body> {
        self.open(ByteRange::open_ended(start))
    }

    fn open(&mut self, range: ByteRange) -> Result<Body> {
        self.stats.requests += 1;
        let resp = self.transport.get_range(&self.url, range)?;
        if resp.status != StatusCode::PARTIAL_CONTENT {
            return Err(StreamError::ServerProtocol {
                status: resp.status.as_u16(),
                request: range.to_string(),
            });
        }
        Ok(resp.body)
    }
}
