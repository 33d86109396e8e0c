//! ZIP listing and extraction through a remote stream.

mod common;

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use httpseek::zip::CompressionMethod;
use httpseek::{RemoteFile, ZipExtractor};

use common::{MemoryServer, content, open};

struct Member {
    name: &'static str,
    data: Vec<u8>,
    method: u16,
    /// Local header offset to advertise through a ZIP64 extra field.
    zip64_offset: Option<u64>,
}

impl Member {
    fn stored(name: &'static str, data: Vec<u8>) -> Self {
        Self {
            name,
            data,
            method: 0,
            zip64_offset: None,
        }
    }

    fn deflated(name: &'static str, data: Vec<u8>) -> Self {
        Self {
            name,
            data,
            method: 8,
            zip64_offset: None,
        }
    }
}

/// Build a minimal ZIP archive in memory.
fn build_zip(members: &[Member], comment: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();

    for member in members {
        let payload = if member.method == 8 {
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(&member.data).unwrap();
            enc.finish().unwrap()
        } else {
            member.data.clone()
        };
        let mut crc = flate2::Crc::new();
        crc.update(&member.data);
        let crc = crc.sum();
        let offset = out.len() as u32;
        // 2024-03-15 13:45:30
        let (time, date) = ((13u16 << 11) | (45 << 5) | 15, ((44u16) << 9) | (3 << 5) | 15);

        out.write_all(b"PK\x03\x04").unwrap();
        out.write_u16::<LittleEndian>(20).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(member.method).unwrap();
        out.write_u16::<LittleEndian>(time).unwrap();
        out.write_u16::<LittleEndian>(date).unwrap();
        out.write_u32::<LittleEndian>(crc).unwrap();
        out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        out.write_u32::<LittleEndian>(member.data.len() as u32).unwrap();
        out.write_u16::<LittleEndian>(member.name.len() as u16).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_all(member.name.as_bytes()).unwrap();
        out.write_all(&payload).unwrap();

        central.write_all(b"PK\x01\x02").unwrap();
        central.write_u16::<LittleEndian>(20).unwrap();
        central.write_u16::<LittleEndian>(20).unwrap();
        central.write_u16::<LittleEndian>(0).unwrap();
        central.write_u16::<LittleEndian>(member.method).unwrap();
        central.write_u16::<LittleEndian>(time).unwrap();
        central.write_u16::<LittleEndian>(date).unwrap();
        central.write_u32::<LittleEndian>(crc).unwrap();
        central.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
        central.write_u32::<LittleEndian>(member.data.len() as u32).unwrap();
        central.write_u16::<LittleEndian>(member.name.len() as u16).unwrap();
        let extra_len = if member.zip64_offset.is_some() { 12 } else { 0 };
        central.write_u16::<LittleEndian>(extra_len).unwrap();
        central.write_u16::<LittleEndian>(0).unwrap(); // comment
        central.write_u16::<LittleEndian>(0).unwrap(); // disk
        central.write_u16::<LittleEndian>(0).unwrap(); // internal attrs
        central.write_u32::<LittleEndian>(0).unwrap(); // external attrs
        match member.zip64_offset {
            Some(_) => central.write_u32::<LittleEndian>(0xFFFFFFFF).unwrap(),
            None => central.write_u32::<LittleEndian>(offset).unwrap(),
        }
        central.write_all(member.name.as_bytes()).unwrap();
        if let Some(zip64_offset) = member.zip64_offset {
            central.write_u16::<LittleEndian>(0x0001).unwrap();
            central.write_u16::<LittleEndian>(8).unwrap();
            central.write_u64::<LittleEndian>(zip64_offset).unwrap();
        }
    }

    let cd_offset = out.len() as u32;
    out.write_all(&central).unwrap();

    out.write_all(b"PK\x05\x06").unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(0).unwrap();
    out.write_u16::<LittleEndian>(members.len() as u16).unwrap();
    out.write_u16::<LittleEndian>(members.len() as u16).unwrap();
    out.write_u32::<LittleEndian>(central.len() as u32).unwrap();
    out.write_u32::<LittleEndian>(cd_offset).unwrap();
    out.write_u16::<LittleEndian>(comment.len() as u16).unwrap();
    out.write_all(comment).unwrap();
    out
}

fn sample_members() -> Vec<Member> {
    vec![
        Member::stored("docs/", Vec::new()),
        Member::stored("docs/readme.txt", b"hello from a remote archive\n".to_vec()),
        Member::deflated("data/table.csv", b"id,value\n".repeat(500)),
    ]
}

#[test]
fn test_list_and_extract_remote_archive() {
    let archive = build_zip(&sample_members(), b"archive comment");
    let server = MemoryServer::new(archive).into_arc();
    let stream = open(&server, 512);

    let mut extractor = ZipExtractor::new(stream).unwrap();
    let entries = extractor.list_files().unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
    assert_eq!(names, vec!["docs/", "docs/readme.txt", "data/table.csv"]);

    assert!(entries[0].is_directory);
    assert_eq!(entries[1].compression_method, CompressionMethod::Stored);
    assert_eq!(entries[2].compression_method, CompressionMethod::Deflate);
    assert!(entries[2].compressed_size < entries[2].uncompressed_size);
    assert_eq!(entries[1].mod_date(), (2024, 3, 15));

    assert_eq!(
        extractor.extract_to_memory(&entries[1]).unwrap(),
        b"hello from a remote archive\n"
    );
    assert_eq!(
        extractor.extract_to_memory(&entries[2]).unwrap(),
        b"id,value\n".repeat(500)
    );
}

#[test]
fn test_listing_reads_only_the_tail() {
    let members = vec![
        Member::stored("big.bin", content(200_000)),
        Member::stored("small.txt", b"tail".to_vec()),
    ];
    let archive = build_zip(&members, b"");
    let archive_len = archive.len();
    let server = MemoryServer::new(archive).into_arc();
    let stream = open(&server, 256);

    let mut extractor = ZipExtractor::new(stream).unwrap();
    let entries = extractor.list_files().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(extractor.extract_to_memory(&entries[1]).unwrap(), b"tail");

    let stream = extractor.into_inner();
    assert_eq!(stream.size(), archive_len as u64);
    assert!(stream.transferred_bytes() < 2048);
    assert!(stream.stats().requests <= 4);
}

#[test]
fn test_extract_to_file() {
    let archive = build_zip(&sample_members(), b"");
    let server = MemoryServer::new(archive).into_arc();
    let mut extractor = ZipExtractor::new(open(&server, 1024)).unwrap();
    let entries = extractor.list_files().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join(&entries[2].file_name);
    extractor.extract_to_file(&entries[2], &target).unwrap();

    assert_eq!(std::fs::read(&target).unwrap(), b"id,value\n".repeat(500));
}

#[test]
fn test_crc_mismatch_is_reported() {
    let mut archive = build_zip(&[Member::stored("a.txt", b"abc".to_vec())], b"");
    // Flip a payload byte: local header (30) + name (5).
    archive[35] ^= 0xFF;

    let mut extractor = ZipExtractor::new(Cursor::new(archive)).unwrap();
    let entries = extractor.list_files().unwrap();
    let err = extractor.extract_to_memory(&entries[0]).unwrap_err();
    assert!(err.to_string().contains("CRC-32 mismatch"));
}

#[test]
fn test_unsupported_method_is_rejected() {
    let archive = build_zip(
        &[Member {
            name: "x.bz2",
            data: b"data".to_vec(),
            method: 12,
            zip64_offset: None,
        }],
        b"",
    );
    let mut extractor = ZipExtractor::new(Cursor::new(archive)).unwrap();
    let entries = extractor.list_files().unwrap();
    assert_eq!(entries[0].compression_method, CompressionMethod::Unknown(12));
    assert!(extractor.extract_to_memory(&entries[0]).is_err());
}

#[test]
fn test_not_a_zip() {
    let result = ZipExtractor::new(Cursor::new(content(100))).and_then(|mut z| z.list_files());
    assert!(result.is_err());
}

#[test]
fn test_zip64_offset_past_end_is_an_error() {
    let mut member = Member::stored("far.bin", b"payload".to_vec());
    member.zip64_offset = Some(u64::MAX - 4);
    let archive = build_zip(&[member], b"");

    let mut extractor = ZipExtractor::new(Cursor::new(archive)).unwrap();
    let entries = extractor.list_files().unwrap();
    assert_eq!(entries[0].lfh_offset, u64::MAX - 4);

    let err = extractor.extract_to_memory(&entries[0]).unwrap_err();
    assert!(err.to_string().contains("Truncated ZIP file"));
}

#[test]
fn test_entry_paths_are_confined() {
    let archive = build_zip(
        &[
            Member::stored("../escaped.txt", b"x".to_vec()),
            Member::stored("/etc/passwd", b"x".to_vec()),
            Member::stored("a/../../b.txt", b"x".to_vec()),
            Member::stored("./docs/ok.txt", b"x".to_vec()),
        ],
        b"",
    );
    let mut extractor = ZipExtractor::new(Cursor::new(archive)).unwrap();
    let entries = extractor.list_files().unwrap();

    assert_eq!(entries[0].enclosed_name(), None);
    assert_eq!(entries[1].enclosed_name(), None);
    assert_eq!(entries[2].enclosed_name(), None);
    assert_eq!(
        entries[3].enclosed_name(),
        Some(std::path::PathBuf::from("docs/ok.txt"))
    );
}
