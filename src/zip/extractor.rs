use std::fs;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Result, bail};
use flate2::CrcWriter;
use flate2::read::DeflateDecoder;
use tracing::debug;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Read size used while copying entry data out of the archive.
const EXTRACT_BUFFER: usize = 64 * 1024;

/// ZIP file extractor.
///
/// Works over any `Read + Seek` source. Over a remote stream, listing costs
/// one ranged request for the EOCD and one for the Central Directory, and
/// each extraction reads only the entry's local header and data.
pub struct ZipExtractor<R> {
    parser: ZipParser<R>,
}

impl<R: Read + Seek> ZipExtractor<R> {
    /// Wrap `reader`. Nothing is parsed until [`list_files`](Self::list_files).
    pub fn new(reader: R) -> Result<Self> {
        Ok(Self {
            parser: ZipParser::new(reader)?,
        })
    }

    /// List all files in the archive
    pub fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files()
    }

    /// Decompress `entry` into `out`, verifying its CRC-32.
    ///
    /// Returns the number of bytes written.
    pub fn extract_to_writer<W: Write>(&mut self, entry: &ZipFileEntry, out: W) -> Result<u64> {
        let data_offset = self.parser.get_data_offset(entry)?;
        debug!(name = %entry.file_name, data_offset, "extracting entry");

        let reader = self.parser.reader_mut();
        reader.seek(SeekFrom::Start(data_offset))?;
        let mut compressed =
            BufReader::with_capacity(EXTRACT_BUFFER, Read::take(reader, entry.compressed_size));

        let mut out = CrcWriter::new(out);
        let written = match entry.compression_method {
            CompressionMethod::Stored => io::copy(&mut compressed, &mut out)?,
            CompressionMethod::Deflate => io::copy(&mut DeflateDecoder::new(compressed), &mut out)?,
            CompressionMethod::Unknown(method) => {
                bail!(
                    "Unsupported compression method {method} for {} (only STORED and DEFLATE are supported)",
                    entry.file_name
                )
            }
        };

        if written != entry.uncompressed_size {
            bail!(
                "Size mismatch for {}: expected {} bytes, got {written}",
                entry.file_name,
                entry.uncompressed_size
            );
        }
        let crc = out.crc().sum();
        if crc != entry.crc32 {
            bail!(
                "CRC-32 mismatch for {}: expected {:08x}, got {crc:08x}",
                entry.file_name,
                entry.crc32
            );
        }
        out.flush()?;
        Ok(written)
    }

    /// Extract file data to memory
    pub fn extract_to_memory(&mut self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(entry.uncompressed_size.min(1 << 24) as usize);
        self.extract_to_writer(entry, &mut buf)?;
        Ok(buf)
    }

    /// Extract file to disk, creating parent directories as needed.
    ///
    /// `output_path` is used as given. Callers deriving it from the entry
    /// name should go through [`ZipFileEntry::enclosed_name`].
    pub fn extract_to_file(&mut self, entry: &ZipFileEntry, output_path: &Path) -> Result<()> {
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = fs::File::create(output_path)?;
        self.extract_to_writer(entry, io::BufWriter::new(file))?;
        Ok(())
    }

    /// Extract file to stdout
    pub fn extract_to_stdout(&mut self, entry: &ZipFileEntry) -> Result<()> {
        let stdout = io::stdout();
        self.extract_to_writer(entry, stdout.lock())?;
        Ok(())
    }

    /// Give back the underlying reader, e.g. to read its transfer stats.
    pub fn into_inner(self) -> R {
        self.parser.into_inner()
    }
}
