//! Forward-only access over one long-lived connection.
//!
//! A session is an owned, optional handle on the stream. Only one exists at a
//! time: starting another session, seeking to a new position, or doing a
//! buffered read drops the current one and its connection. Each session gets
//! a fresh generation number, so a ticket from a dropped session is
//! recognized as stale and ends iteration instead of yielding bytes from the
//! wrong offset.

use std::io::{self, Read};
use std::iter::FusedIterator;

use bytes::Bytes;
use tracing::debug;

use super::stream::SeekableStream;
use super::window::BufferWindow;
use super::{Body, Transport};
use crate::error::{Result, StreamError};

/// An open sequential connection owned by a stream.
pub(crate) struct IterationSession {
    pub(crate) generation: u64,
    body: Body,
}

/// Identifies one sequential session. Stale after the session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTicket {
    generation: u64,
}

impl<T: Transport> SeekableStream<T> {
    /// Start a sequential session at the current cursor.
    ///
    /// Opens a single `bytes=<cursor>-` request, which must be answered with
    /// `206 Partial Content`. Any previous session is dropped first. At EOF no
    /// connection is opened and the session yields nothing.
    pub fn begin_sequential(&mut self) -> Result<SessionTicket> {
        self.ensure_open()?;
        self.end_session();
        self.window = BufferWindow::empty_at(self.cursor);

        self.generation += 1;
        let ticket = SessionTicket {
            generation: self.generation,
        };
        if self.cursor < self.resource.size {
            let body = self.fetcher.open_from(self.cursor)?;
            self.session = Some(IterationSession {
                generation: ticket.generation,
                body,
            });
            debug!(generation = ticket.generation, start = self.cursor, "sequential session opened");
        }
        Ok(ticket)
    }

    /// Next block of the session identified by `ticket`.
    ///
    /// Returns `Ok(None)` once the connection is exhausted, or when `ticket`
    /// no longer names the active session.
    pub fn next_chunk(&mut self, ticket: SessionTicket) -> Result<Option<Bytes>> {
        self.ensure_open()?;
        let remaining = self.resource.size.saturating_sub(self.cursor);
        let block = self.config.block_size.max(1);
        let Some(session) = self
            .session
            .as_mut()
            .filter(|s| s.generation == ticket.generation)
        else {
            return Ok(None);
        };

        let limit = usize::try_from(remaining).unwrap_or(usize::MAX).min(block);
        let mut buf = vec![0u8; limit];
        let n = match read_full(&mut session.body, &mut buf) {
            Ok(n) => n,
            Err(err) => {
                self.end_session();
                return Err(StreamError::connectivity(err));
            }
        };

        if n == 0 {
            self.end_session();
            return Ok(None);
        }

        buf.truncate(n);
        self.cursor += n as u64;
        self.window = BufferWindow::empty_at(self.cursor);
        self.fetcher.add_received(n);
        Ok(Some(Bytes::from(buf)))
    }

    /// Iterate from the cursor to EOF in blocks of the configured size.
    ///
    /// The iterator borrows the stream; once it is dropped, the session stays
    /// open until the next `seek`, `read` or new iteration tears it down.
    pub fn chunks(&mut self) -> Result<Chunks<'_, T>> {
        let ticket = self.begin_sequential()?;
        Ok(Chunks {
            stream: self,
            ticket,
            done: false,
        })
    }
}

/// Fill `buf` from `body` unless EOF comes first.
fn read_full(body: &mut Body, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match body.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Lazy, finite, non-restartable sequence of chunks. See [`SeekableStream::chunks`].
///
/// Yields at most one error, after which it is finished.
pub struct Chunks<'a, T: Transport> {
    stream: &'a mut SeekableStream<T>,
    ticket: SessionTicket,
    done: bool,
}

impl<T: Transport> Chunks<'_, T> {
    pub fn ticket(&self) -> SessionTicket {
        self.ticket
    }
}

impl<T: Transport> Iterator for Chunks<'_, T> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.stream.next_chunk(self.ticket) {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<T: Transport> FusedIterator for Chunks<'_, T> {}
