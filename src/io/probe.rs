//! Resource discovery performed once, before a stream exists.
//!
//! The probe costs exactly two round trips: a HEAD request for the metadata
//! and a one-byte ranged GET proving the server really honors ranges. Some
//! servers advertise `Accept-Ranges: bytes` and then answer `200 OK` with the
//! whole body; those are rejected here rather than on the first read.

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use reqwest::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, LAST_MODIFIED,
};
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::{ByteRange, Transport};
use crate::error::{Result, StreamError};

/// Name used when neither the response nor the URL provide one.
pub const FALLBACK_NAME: &str = "download";

/// Content type used when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Static metadata of a remote resource. Never changes after the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResource {
    pub url: String,
    pub size: u64,
    pub range_supported: bool,
    pub content_type: String,
    pub name: String,
    pub last_modified: Option<DateTime<Utc>>,
    /// When the probe completed.
    pub probed_at: DateTime<Utc>,
}

impl RemoteResource {
    /// `Last-Modified` when the server sent one, else the probe time.
    pub fn modified(&self) -> DateTime<Utc> {
        self.last_modified.unwrap_or(self.probed_at)
    }
}

/// Probe `url` and validate range support.
///
/// # Errors
///
/// - [`StreamError::UnsupportedRange`] when `Accept-Ranges` lacks `bytes`, or
///   the verification fetch is not answered with `206 Partial Content`
/// - [`StreamError::AmbiguousSize`] when `Content-Length` is missing
/// - [`StreamError::ServerProtocol`] when the HEAD request itself fails
/// - [`StreamError::Connectivity`] on transport failure
pub fn probe<T: Transport + ?Sized>(transport: &T, url: &str) -> Result<RemoteResource> {
    let resp = transport.head(url)?;
    if !resp.status.is_success() {
        return Err(StreamError::ServerProtocol {
            status: resp.status.as_u16(),
            request: format!("HEAD {url}"),
        });
    }
    let headers = resp.headers;

    if !accepts_byte_ranges(&headers) {
        return Err(StreamError::UnsupportedRange {
            reason: "missing Accept-Ranges: bytes".to_string(),
        });
    }

    let size = header_str(&headers, CONTENT_LENGTH.as_str())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| StreamError::AmbiguousSize {
            url: url.to_string(),
        })?;

    // A zero-length resource has no satisfiable byte range to verify with.
    if size > 0 {
        verify_range_support(transport, url)?;
    }

    let name = disposition_filename(&headers)
        .or_else(|| name_from_url(url))
        .unwrap_or_else(|| FALLBACK_NAME.to_string());
    let content_type = declared_content_type(&headers)
        .or_else(|| guess_content_type(&name))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    let last_modified = header_str(&headers, LAST_MODIFIED.as_str())
        .and_then(|s| DateTime::parse_from_rfc2822(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc));

    debug!(url, size, name = %name, content_type = %content_type, "probed remote resource");

    Ok(RemoteResource {
        url: url.to_string(),
        size,
        range_supported: true,
        content_type,
        name,
        last_modified,
        probed_at: Utc::now(),
    })
}

fn verify_range_support<T: Transport + ?Sized>(transport: &T, url: &str) -> Result<()> {
    let resp = transport.get_range(url, ByteRange::bounded(0, 0))?;
    if resp.status != StatusCode::PARTIAL_CONTENT {
        return Err(StreamError::UnsupportedRange {
            reason: format!("server answered {} to bytes=0-0", resp.status),
        });
    }
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn accepts_byte_ranges(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("bytes"))
}

fn declared_content_type(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, CONTENT_TYPE.as_str())?;
    let essence = value.split(';').next().unwrap_or_default().trim();
    (!essence.is_empty()).then(|| essence.to_string())
}

fn guess_content_type(name: &str) -> Option<String> {
    mime_guess::from_path(name)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

/// Filename from `Content-Disposition`; `filename*` wins over `filename`.
fn disposition_filename(headers: &HeaderMap) -> Option<String> {
    let value = header_str(headers, CONTENT_DISPOSITION.as_str())?;

    let mut plain = None;
    let mut extended = None;
    for param in split_params(value) {
        let Some((key, val)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();
        if key.eq_ignore_ascii_case("filename*") {
            extended = decode_ext_value(val);
        } else if key.eq_ignore_ascii_case("filename") {
            plain = Some(unquote(val).to_string());
        }
    }

    extended.or(plain).filter(|name| !name.is_empty())
}

/// Split a header value on `;`, leaving quoted strings intact.
fn split_params(value: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&value[start..]);
    params
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// RFC 5987 `charset'language'percent-encoded`.
fn decode_ext_value(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let _charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;
    Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned())
}

/// Percent-decoded last non-empty path segment.
fn name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.rfind(|s| !s.is_empty())?;
    let name = percent_decode_str(segment).decode_utf8_lossy().into_owned();
    (!name.is_empty()).then_some(name)
}
