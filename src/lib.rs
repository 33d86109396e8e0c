//! # httpseek
//!
//! Read a remote HTTP(S) resource as if it were a local read-only file.
//!
//! [`SeekableStream`] implements `std::io::Read` and `std::io::Seek` on top of
//! HTTP Range requests, so any parser that works on a local file can work on
//! a URL without downloading it in full. Only the byte ranges a caller
//! actually touches travel over the network.
//!
//! ## Features
//!
//! - Probe and validate range support before any read
//! - Buffered random access with a tunable read-ahead
//! - Forward-only chunk iteration over a single connection
//! - Typed errors that separate fatal from per-call failures
//! - A ZIP reader that lists and extracts members of remote archives
//!
//! ## Example
//!
//! ```no_run
//! use httpseek::{RemoteFile, SeekableStream, ZipExtractor};
//!
//! fn main() -> anyhow::Result<()> {
//!     let stream = SeekableStream::open("https://example.com/archive.zip")?;
//!     println!("{} ({} bytes, {})", stream.name(), stream.size(), stream.content_type());
//!
//!     let mut extractor = ZipExtractor::new(stream)?;
//!     for file in extractor.list_files()? {
//!         println!("{}", file.file_name);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use config::{ReadAhead, StreamConfig};
pub use error::{Result, StreamError};
pub use io::{
    BufferWindow, ByteRange, Chunks, FileStat, HttpTransport, RemoteFile, RemoteResource,
    SeekableStream, SessionTicket, Transport, Whence, probe,
};
pub use zip::{ZipExtractor, ZipFileEntry};
