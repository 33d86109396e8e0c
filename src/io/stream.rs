use std::io::{self, Read, Seek, SeekFrom};

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use super::fetch::{RangeFetcher, TransferStats};
use super::http::HttpTransport;
use super::probe::{RemoteResource, probe};
use super::sequential::IterationSession;
use super::window::BufferWindow;
use super::{ByteRange, FileStat, RemoteFile, Transport};
use crate::config::StreamConfig;
use crate::error::{Result, StreamError};

/// Reference point for [`SeekableStream::seek_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Absolute position (`SEEK_SET`).
    Start,
    /// Relative to the cursor (`SEEK_CUR`).
    Current,
    /// Relative to the end of the resource (`SEEK_END`).
    End,
}

impl TryFrom<i32> for Whence {
    type Error = StreamError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            other => Err(StreamError::InvalidArgument(format!(
                "invalid whence ({other}, should be 0, 1 or 2)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    Closed,
}

/// A remote HTTP resource exposed as a read-only, seekable file.
///
/// Reads are served from a single [`BufferWindow`]; a miss issues one ranged
/// request of at least one block (see [`ReadAhead`](crate::ReadAhead)) and
/// the surplus stays buffered for the next call.
///
/// The stream is closed when dropped, so a scope owning it releases the
/// buffer and any open connection on every exit path.
///
/// ```no_run
/// use std::io::{Read, Seek, SeekFrom};
/// use httpseek::SeekableStream;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut stream = SeekableStream::open("https://example.com/archive.zip")?;
/// stream.seek(SeekFrom::End(-22))?;
/// let mut eocd = [0u8; 22];
/// stream.read_exact(&mut eocd)?;
/// # Ok(())
/// # }
/// ```
pub struct SeekableStream<T: Transport = HttpTransport> {
    pub(super) resource: RemoteResource,
    pub(super) config: StreamConfig,
    pub(super) fetcher: RangeFetcher<T>,
    pub(super) cursor: u64,
    pub(super) window: BufferWindow,
    pub(super) session: Option<IterationSession>,
    pub(super) generation: u64,
    accessed: DateTime<Utc>,
    state: StreamState,
}

impl SeekableStream<HttpTransport> {
    /// Probe `url` with the default configuration.
    pub fn open(url: impl Into<String>) -> Result<Self> {
        Self::open_with_config(url, StreamConfig::default())
    }

    pub fn open_with_config(url: impl Into<String>, config: StreamConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(transport, url, config)
    }
}

impl<T: Transport> SeekableStream<T> {
    /// Probe `url` through `transport` and build a stream positioned at 0.
    ///
    /// No stream exists if the probe fails.
    pub fn with_transport(transport: T, url: impl Into<String>, config: StreamConfig) -> Result<Self> {
        let url = url.into();
        let resource = probe(&transport, &url)?;
        Ok(Self {
            resource,
            config,
            fetcher: RangeFetcher::new(transport, url),
            cursor: 0,
            window: BufferWindow::empty_at(0),
            session: None,
            generation: 0,
            accessed: Utc::now(),
            state: StreamState::Open,
        })
    }

    pub fn resource(&self) -> &RemoteResource {
        &self.resource
    }

    pub fn url(&self) -> &str {
        &self.resource.url
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Requests issued and bytes received since construction, probe excluded.
    pub fn stats(&self) -> TransferStats {
        self.fetcher.stats()
    }

    /// Total bytes transferred from the network.
    pub fn transferred_bytes(&self) -> u64 {
        self.fetcher.stats().bytes
    }

    pub fn transport(&self) -> &T {
        self.fetcher.transport()
    }

    /// The currently buffered chunk.
    pub fn window(&self) -> &BufferWindow {
        &self.window
    }

    /// Whether a sequential session currently holds a connection.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn tell(&self) -> Result<u64> {
        self.ensure_open()?;
        Ok(self.cursor)
    }

    /// Move the cursor and return its new value.
    ///
    /// Targets outside `[0, size]` are clamped, except that a negative
    /// absolute position is rejected.
    pub fn seek_to(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.ensure_open()?;
        let base = match whence {
            Whence::Start if offset < 0 => {
                return Err(StreamError::InvalidArgument(format!(
                    "negative seek position {offset}"
                )));
            }
            Whence::Start => 0,
            Whence::Current => i128::from(self.cursor),
            Whence::End => i128::from(self.resource.size),
        };
        let target = (base + i128::from(offset)).clamp(0, i128::from(self.resource.size));
        Ok(self.move_cursor(target as u64))
    }

    fn move_cursor(&mut self, target: u64) -> u64 {
        if target != self.cursor {
            self.end_session();
        }
        if !self.window.contains(target) {
            self.window = BufferWindow::empty_at(target);
        }
        self.cursor = target;
        target
    }

    /// Read up to `size` bytes, or everything up to EOF when `size` is `None`.
    ///
    /// The result is only shorter than requested when it ends exactly at EOF.
    /// At or past EOF the result is empty.
    ///
    /// # Errors
    ///
    /// A failed fetch aborts the whole call. Cursor and buffer keep the values
    /// they had before the call, so the stream stays usable.
    pub fn read_bytes(&mut self, size: Option<u64>) -> Result<Vec<u8>> {
        self.ensure_open()?;

        let file_size = self.resource.size;
        let remaining = file_size.saturating_sub(self.cursor);
        let wanted = size.map_or(remaining, |n| n.min(remaining));
        if wanted == 0 {
            return Ok(Vec::new());
        }
        self.end_session();

        let mut out = Vec::with_capacity(usize::try_from(wanted).unwrap_or(usize::MAX).min(1 << 24));
        let mut pos = self.cursor;
        let mut window = self.window.clone();

        if let Some(hit) = window.slice_from(pos, wanted) {
            trace!(pos, len = hit.len(), "buffer hit");
            out.extend_from_slice(&hit);
            pos += hit.len() as u64;
        }

        while (out.len() as u64) < wanted {
            let needed = wanted - out.len() as u64;
            let len = self
                .config
                .read_ahead
                .fetch_len(needed, file_size - pos, self.config.block_size);
            let end = pos + len - 1;
            let chunk = self.fetcher.fetch(pos, end)?;
            if chunk.is_empty() {
                return Err(StreamError::ServerProtocol {
                    status: 206,
                    request: format!("{} (empty body)", ByteRange::bounded(pos, end)),
                });
            }

            let take = chunk.len().min(usize::try_from(needed).unwrap_or(usize::MAX));
            out.extend_from_slice(&chunk[..take]);
            window = BufferWindow::new(pos, chunk);
            pos += take as u64;
        }

        if !window.contains(pos) {
            window = BufferWindow::empty_at(pos);
        }
        self.cursor = pos;
        self.window = window;
        self.accessed = Utc::now();
        Ok(out)
    }

    /// Drop the sequential session, if any, closing its connection.
    pub(super) fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(generation = session.generation, cursor = self.cursor, "sequential session closed");
        }
    }

    pub(super) fn ensure_open(&self) -> Result<()> {
        match self.state {
            StreamState::Open => Ok(()),
            StreamState::Closed => Err(StreamError::Closed),
        }
    }

    /// Release the buffer and any connection. Idempotent.
    pub fn close(&mut self) {
        if self.state == StreamState::Closed {
            return;
        }
        self.end_session();
        self.window = BufferWindow::default();
        self.state = StreamState::Closed;
        debug!(url = %self.resource.url, "stream closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }
}

impl<T: Transport> Drop for SeekableStream<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T: Transport> Read for SeekableStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.read_bytes(Some(buf.len() as u64))?;
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl<T: Transport> Seek for SeekableStream<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let pos = match pos {
            SeekFrom::Start(n) => {
                self.ensure_open()?;
                Ok(self.move_cursor(n.min(self.resource.size)))
            }
            SeekFrom::Current(n) => self.seek_to(n, Whence::Current),
            SeekFrom::End(n) => self.seek_to(n, Whence::End),
        };
        Ok(pos?)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.tell()?)
    }
}

impl<T: Transport> RemoteFile for SeekableStream<T> {
    fn size(&self) -> u64 {
        self.resource.size
    }

    fn name(&self) -> &str {
        &self.resource.name
    }

    fn content_type(&self) -> &str {
        &self.resource.content_type
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.resource.last_modified
    }

    fn stat(&self) -> FileStat {
        FileStat {
            mode: FileStat::READ_ONLY_FILE,
            size: self.resource.size,
            accessed: self.accessed,
            modified: self.resource.modified(),
        }
    }

    fn readable(&self) -> bool {
        !self.is_closed()
    }

    fn close(&mut self) {
        SeekableStream::close(self);
    }

    fn is_closed(&self) -> bool {
        SeekableStream::is_closed(self)
    }
}
