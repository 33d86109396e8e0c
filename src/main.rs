//! Command-line front end for httpseek.
//!
//! Lists and extracts ZIP archives from local paths or HTTP URLs, prints the
//! probe metadata of a remote resource, or dumps a raw byte range of it.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use httpseek::{Cli, RemoteFile, SeekableStream, ZipExtractor, ZipFileEntry};

fn main() -> Result<()> {
    init_tracing();
    // Several dependencies may pull in a rustls provider; pick one explicitly.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    if cli.is_http_url() {
        let stream = SeekableStream::open_with_config(cli.file.clone(), cli.stream_config())
            .with_context(|| format!("cannot open {}", cli.file))?;
        info!(url = %cli.file, size = stream.size(), "remote resource opened");

        if cli.info {
            print_info(&stream);
            return Ok(());
        }

        let stream = run(stream, &cli)?;
        if !cli.is_quiet() {
            let stats = stream.stats();
            eprintln!(
                "\nTotal bytes transferred: {} in {} requests",
                format_size(stats.bytes),
                stats.requests
            );
        }
    } else {
        let file = File::open(&cli.file).with_context(|| format!("cannot open {}", cli.file))?;
        run(file, &cli)?;
    }

    Ok(())
}

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, `warn` by default.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Dispatch on the CLI mode and hand the reader back for statistics.
///
/// `--range` dumps raw bytes; everything else treats the input as a ZIP.
fn run<R: Read + Seek>(mut reader: R, cli: &Cli) -> Result<R> {
    if let Some((start, len)) = cli.range {
        dump_range(&mut reader, start, len)?;
        return Ok(reader);
    }

    let mut extractor = ZipExtractor::new(reader)?;
    process_zip(&mut extractor, cli)?;
    Ok(extractor.into_inner())
}

/// Print the probed metadata of a remote file (`-I`).
///
/// # Arguments
///
/// * `file` - The opened remote file
fn print_info(file: &impl RemoteFile) {
    let stat = file.stat();
    println!("Name:          {}", file.name());
    println!("Size:          {} ({})", file.size(), format_size(file.size()));
    println!("Content-Type:  {}", file.content_type());
    match file.last_modified() {
        Some(at) => println!("Last-Modified: {}", at.to_rfc2822()),
        None => println!("Last-Modified: unknown"),
    }
    println!("Mode:          {:o}", stat.mode);
}

/// Copy `len` bytes starting at `start` to stdout (`--range`).
///
/// Stops early at EOF; a range past the end prints nothing.
fn dump_range<R: Read + Seek>(reader: &mut R, start: u64, len: u64) -> Result<()> {
    reader.seek(SeekFrom::Start(start))?;
    let mut stdout = io::stdout().lock();
    io::copy(&mut reader.take(len), &mut stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Process a ZIP archive based on CLI options.
///
/// - List mode (`-l` or `-v`): display archive contents
/// - Extract mode: extract files matching the positional filters, minus `-x`
///
/// # Arguments
///
/// * `extractor` - Extractor over a local file or a remote stream
/// * `cli` - Parsed command-line arguments
fn process_zip<R: Read + Seek>(extractor: &mut ZipExtractor<R>, cli: &Cli) -> Result<()> {
    let entries = extractor.list_files()?;

    if cli.list || cli.verbose {
        list_files(&entries, cli.verbose);
        return Ok(());
    }

    let selected: Vec<_> = entries
        .iter()
        .filter(|e| !e.is_directory && is_selected(e, cli))
        .collect();

    let multiple_files = cli.pipe && selected.len() > 1;
    for entry in selected {
        extract_file(extractor, entry, cli, multiple_files)?;
    }
    Ok(())
}

/// Positional names select (glob or exact, full path or basename); `-x` excludes.
fn is_selected(entry: &ZipFileEntry, cli: &Cli) -> bool {
    let requested = cli.files.is_empty()
        || cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, &entry.file_name)
            } else {
                entry.file_name == *f || basename(&entry.file_name) == *f
            }
        });

    let excluded = cli
        .exclude
        .iter()
        .any(|x| entry.file_name.contains(x.as_str()) || glob_match(x, &entry.file_name));

    requested && !excluded
}

/// List entries of the archive.
///
/// - Simple format (`-l`): one name per line
/// - Verbose format (`-v`): table with sizes, compression ratio and timestamps
///
/// # Arguments
///
/// * `entries` - Central directory entries
/// * `verbose` - If true, print the detailed table
fn list_files(entries: &[ZipFileEntry], verbose: bool) {
    if !verbose {
        for entry in entries {
            println!("{}", entry.file_name);
        }
        return;
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "Date", "Time"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _) = entry.mod_time();
        println!(
            "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>21}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );
}

/// Space saved by compression, as a right-aligned percentage.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed == 0 {
        return "  0%".to_string();
    }
    let saved = 100i64 - (compressed.saturating_mul(100) / uncompressed) as i64;
    format!("{saved:>4}%")
}

/// Extract a single entry.
///
/// Handles the extraction options:
/// - Pipe mode (`-p`): write to stdout instead of a file
/// - Output directory (`-d`) and junk paths (`-j`)
/// - Overwrite control (`-n`, `-o`)
///
/// Entries whose names would land outside the output directory are skipped.
///
/// # Arguments
///
/// * `extractor` - The ZIP extractor instance
/// * `entry` - The entry to extract
/// * `cli` - Parsed command-line arguments
/// * `show_filename` - Print a name marker before the content (pipe mode, several files)
fn extract_file<R: Read + Seek>(
    extractor: &mut ZipExtractor<R>,
    entry: &ZipFileEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    if cli.pipe {
        if show_filename {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "--- {} ---", entry.file_name)?;
        }
        return extractor.extract_to_stdout(entry);
    }

    let Some(output_path) = output_path(entry, cli) else {
        warn!(name = %entry.file_name, "entry escapes the extraction directory");
        if !cli.is_very_quiet() {
            eprintln!("Skipping: {} (unsafe path)", entry.file_name);
        }
        return Ok(());
    };

    if output_path.exists() && (cli.never_overwrite || !cli.overwrite) {
        if !cli.is_very_quiet() {
            let hint = if cli.never_overwrite {
                "file exists"
            } else {
                "use -o to overwrite"
            };
            eprintln!("Skipping: {} ({hint})", entry.file_name);
        }
        return Ok(());
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", entry.file_name);
    }
    extractor.extract_to_file(entry, &output_path)
}

/// Where `entry` lands on disk, honoring `-d` and `-j`.
///
/// Returns `None` for names that would resolve outside the extraction
/// directory (absolute paths, drive prefixes, `..` components).
fn output_path(entry: &ZipFileEntry, cli: &Cli) -> Option<PathBuf> {
    let mut relative = entry.enclosed_name()?;
    if cli.junk_paths {
        relative = PathBuf::from(relative.file_name()?);
    }
    Some(match &cli.extract_dir {
        Some(dir) => Path::new(dir).join(relative),
        None => relative,
    })
}

/// Last path component of an archive name, or the name itself.
fn basename(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Check if a pattern contains glob wildcard characters (`*` or `?`).
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters, `/` included
/// - `?` matches exactly one character
///
/// # Arguments
///
/// * `pattern` - The glob pattern to match against
/// * `text` - The text to check for a match
///
/// # Examples
///
/// ```ignore
/// assert!(glob_match("*.txt", "readme.txt"));
/// assert!(glob_match("file?.dat", "file1.dat"));
/// assert!(!glob_match("*.txt", "readme.md"));
/// ```
fn glob_match(pattern: &str, text: &str) -> bool {
    /// Backtracking matcher over chars.
    fn matches(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                matches(&pattern[1..], text) || (!text.is_empty() && matches(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => matches(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if p == t => matches(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    matches(&pattern, &text)
}

/// Format a byte size into a human-readable string.
///
/// Picks bytes, KB, MB or GB by magnitude, with two decimals above bytes.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match size {
        s if s >= GB => format!("{:.2} GB", s as f64 / GB as f64),
        s if s >= MB => format!("{:.2} MB", s as f64 / MB as f64),
        s if s >= KB => format!("{:.2} KB", s as f64 / KB as f64),
        s => format!("{s} bytes"),
    }
}
