//! ZIP archive listing and extraction over any seekable reader.
//!
//! This is the consumer the remote stream is shaped for: a ZIP keeps its
//! index at the end, so a reader seeks to the tail, reads the Central
//! Directory, then seeks backward to each entry it extracts.
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: High-level extraction API for end users
//!
//! ## Supported Features
//!
//! - ZIP64 extensions for files > 4GB
//! - STORED and DEFLATE entries, with CRC-32 verification
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support

mod extractor;
mod parser;
mod structures;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
