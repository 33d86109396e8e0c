use std::time::Duration;

use clap::Parser;

use crate::config::{DEFAULT_BLOCK_SIZE, StreamConfig};

#[derive(Parser, Debug)]
#[command(name = "httpseek")]
#[command(version)]
#[command(about = "Read remote files over HTTP Range requests", long_about = None)]
#[command(after_help = "Examples:\n  \
  httpseek -I https://example.com/archive.zip            show remote file metadata\n  \
  httpseek -l https://example.com/archive.zip            list files from remote ZIP\n  \
  httpseek --range 0:512 https://example.com/disk.img    dump the first 512 bytes\n  \
  httpseek data1.zip -x joe        extract all files except joe from data1.zip")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// Show metadata of the remote resource and exit
    #[arg(short = 'I', long = "info")]
    pub info: bool,

    /// Write raw bytes START:LEN of the resource to stdout and exit
    #[arg(long = "range", value_name = "START:LEN", value_parser = parse_range)]
    pub range: Option<(u64, u64)>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely/show version info
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Bytes fetched per Range request at minimum
    #[arg(long, value_name = "BYTES", env = "HTTPSEEK_BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", env = "HTTPSEEK_TIMEOUT", default_value_t = 30)]
    pub timeout: u64,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe || self.range.is_some()
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Stream configuration from the command-line knobs.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::default()
            .with_block_size(self.block_size)
            .with_timeout(Duration::from_secs(self.timeout))
    }
}

fn parse_range(value: &str) -> Result<(u64, u64), String> {
    let (start, len) = value
        .split_once(':')
        .ok_or_else(|| format!("expected START:LEN, got {value:?}"))?;
    let start = start
        .parse()
        .map_err(|e| format!("invalid start {start:?}: {e}"))?;
    let len = len.parse().map_err(|e| format!("invalid length {len:?}: {e}"))?;
    Ok((start, len))
}
