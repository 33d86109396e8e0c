//! In-memory HTTP server used by the integration tests.
#![allow(dead_code)]

use std::io::{self, Cursor, Read};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use httpseek::io::{Body, Response};
use httpseek::{ByteRange, SeekableStream, StreamConfig, StreamError, Transport};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

pub const URL: &str = "http://test.local/files/data%20set.bin";

/// Failure injected into the next ranged GET.
#[derive(Debug, Clone, Copy)]
pub enum Failure {
    /// The request never gets a response.
    Reset,
    /// The server answers with this status and an empty body.
    Status(u16),
    /// Headers arrive, then the body read fails.
    BrokenBody,
}

#[derive(Default)]
struct State {
    log: Vec<String>,
    fail_next: Option<Failure>,
}

/// Serves one resource, records every request, and can misbehave on demand.
pub struct MemoryServer {
    content: Bytes,
    accept_ranges: bool,
    content_length: bool,
    honor_ranges: bool,
    max_chunk: Option<usize>,
    headers: HeaderMap,
    state: Mutex<State>,
}

impl MemoryServer {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
            accept_ranges: true,
            content_length: true,
            honor_ranges: true,
            max_chunk: None,
            headers: HeaderMap::new(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn without_accept_ranges(mut self) -> Self {
        self.accept_ranges = false;
        self
    }

    pub fn without_content_length(mut self) -> Self {
        self.content_length = false;
        self
    }

    /// Answer every GET with `200 OK` and the full body.
    pub fn ignoring_ranges(mut self) -> Self {
        self.honor_ranges = false;
        self
    }

    /// Cut every partial response to at most `n` bytes.
    pub fn with_max_chunk(mut self, n: usize) -> Self {
        self.max_chunk = Some(n);
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers
            .insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn fail_next(&self, failure: Failure) {
        self.state.lock().unwrap().fail_next = Some(failure);
    }

    /// Every request so far: `HEAD` or the `Range` header value.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    /// Ranged GETs so far.
    pub fn range_requests(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.starts_with("bytes="))
            .collect()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    fn base_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if self.accept_ranges {
            headers.insert("accept-ranges", HeaderValue::from_static("bytes"));
        }
        headers
    }

    fn respond(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
        Response {
            status,
            headers,
            body,
        }
    }
}

struct BrokenReader;

impl Read for BrokenReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"))
    }
}

impl Transport for MemoryServer {
    fn head(&self, _url: &str) -> httpseek::Result<Response> {
        self.state.lock().unwrap().log.push("HEAD".to_string());
        let mut headers = self.base_headers();
        if self.content_length {
            headers.insert("content-length", HeaderValue::from(self.content.len() as u64));
        }
        Ok(Self::respond(StatusCode::OK, headers, Box::new(io::empty())))
    }

    fn get_range(&self, _url: &str, range: ByteRange) -> httpseek::Result<Response> {
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.log.push(range.to_string());
            state.fail_next.take()
        };

        match failure {
            Some(Failure::Reset) => {
                return Err(StreamError::connectivity(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset",
                )));
            }
            Some(Failure::Status(code)) => {
                let status = StatusCode::from_u16(code).unwrap();
                return Ok(Self::respond(status, HeaderMap::new(), Box::new(io::empty())));
            }
            Some(Failure::BrokenBody) => {
                return Ok(Self::respond(
                    StatusCode::PARTIAL_CONTENT,
                    self.base_headers(),
                    Box::new(BrokenReader),
                ));
            }
            None => {}
        }

        let len = self.content.len() as u64;
        if !self.honor_ranges {
            return Ok(Self::respond(
                StatusCode::OK,
                self.base_headers(),
                Box::new(Cursor::new(self.content.clone())),
            ));
        }
        if range.start >= len {
            return Ok(Self::respond(
                StatusCode::RANGE_NOT_SATISFIABLE,
                self.base_headers(),
                Box::new(io::empty()),
            ));
        }

        let end = range.end.unwrap_or(len - 1).min(len - 1);
        let mut slice = self.content.slice(range.start as usize..=end as usize);
        if let Some(max) = self.max_chunk {
            slice.truncate(max);
        }
        Ok(Self::respond(
            StatusCode::PARTIAL_CONTENT,
            self.base_headers(),
            Box::new(Cursor::new(slice)),
        ))
    }
}

/// Deterministic, non-repeating-looking test content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + 7) % 251) as u8).collect()
}

/// Open a stream over `server` and forget the probe requests.
pub fn open(server: &Arc<MemoryServer>, block_size: usize) -> SeekableStream<Arc<MemoryServer>> {
    let config = StreamConfig::default().with_block_size(block_size);
    let stream = SeekableStream::with_transport(Arc::clone(server), URL, config)
        .expect("probe should succeed");
    server.clear_log();
    stream
}
