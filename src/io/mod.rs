//! Remote file access over HTTP Range requests.
//!
//! A [`SeekableStream`] probes the resource once at construction, then serves
//! `read`/`seek` calls from a single buffer window, issuing a ranged request
//! only when the window misses. [`SeekableStream::chunks`] is the alternate,
//! connection-based access mode for forward-only consumption.
//!
//! Network access goes through the [`Transport`] trait. [`HttpTransport`] is
//! the reqwest-backed implementation; tests plug in an in-memory server.

mod fetch;
mod http;
mod probe;
mod sequential;
mod stream;
mod window;

pub use fetch::{RangeFetcher, TransferStats};
pub use http::HttpTransport;
pub use probe::{RemoteResource, probe};
pub use sequential::{Chunks, SessionTicket};
pub use stream::{SeekableStream, Whence};
pub use window::BufferWindow;

use std::fmt;
use std::io::{Read, Seek};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::error::Result;

/// Response body as a blocking byte stream.
pub type Body = Box<dyn Read + Send>;

/// A response as seen by the stream: status, headers and an unread body.
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Value of a `Range` request header, with inclusive bounds.
///
/// An open `end` requests everything from `start` to EOF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// `bytes=<start>-<end>`
    pub fn bounded(start: u64, end_inclusive: u64) -> Self {
        Self {
            start,
            end: Some(end_inclusive),
        }
    }

    /// `bytes=<start>-`
    pub fn open_ended(start: u64) -> Self {
        Self { start, end: None }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "bytes={}-{}", self.start, end),
            None => write!(f, "bytes={}-", self.start),
        }
    }
}

/// The HTTP operations a remote stream needs.
pub trait Transport {
    /// Send a metadata-only (HEAD) request.
    fn head(&self, url: &str) -> Result<Response>;

    /// Send a GET carrying a `Range` header. The body is left unread.
    fn get_range(&self, url: &str, range: ByteRange) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn head(&self, url: &str) -> Result<Response> {
        (**self).head(url)
    }

    fn get_range(&self, url: &str, range: ByteRange) -> Result<Response> {
        (**self).get_range(url, range)
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn head(&self, url: &str) -> Result<Response> {
        (**self).head(url)
    }

    fn get_range(&self, url: &str, range: ByteRange) -> Result<Response> {
        (**self).get_range(url, range)
    }
}

/// `stat`-style metadata of a remote file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Unix mode bits.
    pub mode: u32,
    pub size: u64,
    /// Last successful read, or construction time before any.
    pub accessed: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl FileStat {
    /// Regular file, `r--r--r--`.
    pub const READ_ONLY_FILE: u32 = 0o100444;

    /// Remote resources carry no creation time; it reports `modified`.
    pub fn created(&self) -> DateTime<Utc> {
        self.modified
    }
}

/// A read-only, seekable file backed by something other than the local disk.
///
/// Format parsers that only need `Read + Seek` can take any implementor;
/// the extra methods expose the metadata and capabilities a local file has.
pub trait RemoteFile: Read + Seek {
    /// Total size in bytes, fixed for the life of the file.
    fn size(&self) -> u64;

    fn name(&self) -> &str;

    /// Media type without parameters.
    fn content_type(&self) -> &str;

    fn last_modified(&self) -> Option<DateTime<Utc>>;

    fn stat(&self) -> FileStat;

    /// True until the file is closed.
    fn readable(&self) -> bool;

    fn seekable(&self) -> bool {
        true
    }

    fn writable(&self) -> bool {
        false
    }

    fn isatty(&self) -> bool {
        false
    }

    /// Release buffers and connections. Calling it again does nothing.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}
