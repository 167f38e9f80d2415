// src/storage/path.rs

//! `s3://bucket/key` references to stored entry content.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, Result};

/// Longest accepted path, scheme included.
pub const MAX_PATH_LEN: usize = 1024;

const SCHEME: &str = "s3://";

static BUCKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.\-]{1,61}[a-z0-9]$").expect("bucket pattern is valid")
});

/// A validated object-store location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPath {
    pub bucket: String,
    pub key: String,
}

impl ContentPath {
    /// Parse and validate a path. No network access.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(AppError::invalid_path(raw, "path is empty"));
        }
        if raw.len() > MAX_PATH_LEN {
            return Err(AppError::invalid_path(
                truncate(raw),
                format!("path too long ({} > {MAX_PATH_LEN} bytes)", raw.len()),
            ));
        }

        let rest = raw
            .strip_prefix(SCHEME)
            .ok_or_else(|| AppError::invalid_path(raw, "expected s3://bucket/key"))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| AppError::invalid_path(raw, "missing object key"))?;

        if !BUCKET_RE.is_match(bucket) {
            return Err(AppError::invalid_path(raw, format!("invalid bucket name '{bucket}'")));
        }
        if key.is_empty() {
            return Err(AppError::invalid_path(raw, "missing object key"));
        }
        if key.split('/').any(|segment| segment == "..") {
            return Err(AppError::invalid_path(raw, "key contains a '..' segment"));
        }
        if key.contains('\0') {
            return Err(AppError::invalid_path(raw, "key contains a NUL byte"));
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl FromStr for ContentPath {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ContentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}

fn truncate(raw: &str) -> String {
    let mut end = 64.min(raw.len());
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &raw[..end])
}
