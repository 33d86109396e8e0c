//! Tuning knobs for remote streams.

use std::time::Duration;

/// Default block size used for sequential chunks and read-ahead.
pub const DEFAULT_BLOCK_SIZE: usize = 8192;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// How much data a buffered read fetches per round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadAhead {
    /// Fetch at least one block, keeping the surplus in the buffer window.
    #[default]
    Block,
    /// Fetch exactly what the caller still needs.
    Exact,
    /// Fetch at least this many bytes.
    Bytes(u64),
}

impl ReadAhead {
    /// Length of the next ranged request.
    ///
    /// Never exceeds `remaining`, the bytes left before EOF.
    pub fn fetch_len(&self, needed: u64, remaining: u64, block_size: usize) -> u64 {
        let floor = match *self {
            ReadAhead::Block => block_size as u64,
            ReadAhead::Exact => 0,
            ReadAhead::Bytes(n) => n,
        };
        needed.max(floor).min(remaining)
    }
}

/// Configuration for a [`SeekableStream`](crate::SeekableStream).
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Chunk size for sequential iteration and the read-ahead unit (default: 8192).
    pub block_size: usize,
    /// Read-ahead policy for buffered reads.
    pub read_ahead: ReadAhead,
    /// Whole-request timeout (default: 30s).
    pub timeout: Duration,
    /// Connect timeout (default: 10s).
    pub connect_timeout: Duration,
    /// Custom User-Agent header.
    pub user_agent: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            read_ahead: ReadAhead::default(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: None,
        }
    }
}

impl StreamConfig {
    /// Set the block size. Zero is raised to one.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn with_read_ahead(mut self, read_ahead: ReadAhead) -> Self {
        self.read_ahead = read_ahead;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub(crate) fn user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| concat!("httpseek/", env!("CARGO_PKG_VERSION")).to_string())
    }
}
