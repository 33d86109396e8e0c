//! Low-level ZIP archive parser.
//!
//! Reads ZIP structures from any `Read + Seek` source. The archive is read
//! from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, read each file's Local File Header and data
//!
//! Over a [`SeekableStream`](crate::SeekableStream) listing an archive costs
//! a few ranged requests near the tail, regardless of the archive size.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use anyhow::{Context, Result, bail};
use tracing::debug;

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser over a seekable reader.
pub struct ZipParser<R> {
    reader: R,
    size: u64,
}

impl<R: Read + Seek> ZipParser<R> {
    /// Wrap `reader`, measuring its size by seeking to the end.
    pub fn new(mut reader: R) -> Result<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        Ok(Self { reader, size })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn read_exact_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset.checked_add(len as u64).is_none_or(|end| end > self.size) {
            bail!("Truncated ZIP file: {len} bytes at offset {offset} past end");
        }
        let mut buf = vec![0u8; len];
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Tries the comment-less layout first, then searches backwards for the
    /// signature over the largest possible comment.
    pub fn find_eocd(&mut self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            bail!("Not a valid ZIP file");
        }

        let offset = self.size - eocd_size;
        let buf = self.read_exact_at(offset, EndOfCentralDirectory::SIZE)?;
        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && buf[20..22] == [0, 0] {
            return Ok((EndOfCentralDirectory::from_bytes(&buf)?, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;
        let buf = self.read_exact_at(search_start, search_size as usize)?;

        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            // The comment must run exactly to the end of the file.
            let comment_len = usize::from(u16::from_le_bytes([buf[i + 20], buf[i + 21]]));
            if comment_len == buf.len() - i - EndOfCentralDirectory::SIZE {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
        }

        bail!("Not a valid ZIP file")
    }

    /// Read the ZIP64 End of Central Directory via the locator that sits
    /// immediately before the regular EOCD.
    pub fn read_zip64_eocd(&mut self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .context("Invalid ZIP64 format: no room for locator")?;
        let locator_buf = self.read_exact_at(locator_offset, Zip64EOCDLocator::SIZE)?;
        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let eocd64_buf = self.read_exact_at(locator.eocd64_offset, Zip64EOCD::MIN_SIZE)?;
        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// List all entries from the Central Directory.
    pub fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd()?;

        let (cd_offset, cd_size, total_entries) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset)?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries)
        } else {
            (
                u64::from(eocd.cd_offset),
                u64::from(eocd.cd_size),
                u64::from(eocd.total_entries),
            )
        };
        debug!(cd_offset, cd_size, total_entries, "central directory located");

        // One read for the whole directory: a single ranged request over HTTP.
        let cd_len = usize::try_from(cd_size).context("Central Directory too large")?;
        let cd_data = self.read_exact_at(cd_offset, cd_len)?;
        let mut cursor = Cursor::new(cd_data.as_slice());

        let mut entries = Vec::with_capacity(total_entries.min(65536) as usize);
        for _ in 0..total_entries {
            entries.push(ZipFileEntry::parse_central(&mut cursor)?);
        }
        Ok(entries)
    }

    /// Offset of the entry's data, past its Local File Header.
    ///
    /// The local name and extra field may differ in length from the central
    /// copy, so the LFH itself has to be read.
    pub fn get_data_offset(&mut self, entry: &ZipFileEntry) -> Result<u64> {
        let lfh_buf = self.read_exact_at(entry.lfh_offset, LFH_SIZE)?;
        if &lfh_buf[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header for {}", entry.file_name);
        }

        let mut cursor = Cursor::new(&lfh_buf[26..]);
        let file_name_length = u64::from(cursor.read_u16::<LittleEndian>()?);
        let extra_field_length = u64::from(cursor.read_u16::<LittleEndian>()?);

        entry
            .lfh_offset
            .checked_add(LFH_SIZE as u64 + file_name_length + extra_field_length)
            .with_context(|| format!("Invalid data offset for {}", entry.file_name))
    }

    /// The underlying reader, for reading entry data after
    /// [`get_data_offset`](Self::get_data_offset).
    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
