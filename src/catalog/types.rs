use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::CatalogError;

/// One file on the camera, as reported by the media listing.
///
/// The listing only carries the path; timestamp and size need a separate
/// [`MediaMetadata`] fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaEntry {
    /// `<folder>/<filename>`, e.g. `100GOPRO/GX010001.MP4`.
    pub path: String,
}

impl MediaEntry {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Final path component. Local copies are named by this alone.
    pub fn filename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Camera folder (`100GOPRO`), or `None` for a bare filename.
    pub fn folder(&self) -> Option<&str> {
        self.path.rsplit_once('/').map(|(folder, _)| folder)
    }
}

impl From<&str> for MediaEntry {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Per-file metadata, parsed into integers at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaMetadata {
    /// Capture time, epoch seconds.
    pub creation_timestamp: i64,
    pub size_bytes: u64,
}

impl MediaMetadata {
    pub fn created(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.creation_timestamp, 0)
    }

    /// Parse a metadata document as returned by the camera's media info
    /// endpoint. Unknown fields are ignored.
    pub fn from_json(value: serde_json::Value) -> Result<Self, CatalogError> {
        let raw: RawMediaMetadata = serde_json::from_value(value)
            .map_err(|e| CatalogError::InvalidMetadata(e.to_string()))?;
        raw.try_into()
    }
}

/// A decimal field the camera may send either as a JSON number or as a
/// string of digits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DecimalField {
    Number(i64),
    Text(String),
}

impl DecimalField {
    fn parse(&self, field: &str) -> Result<i64, CatalogError> {
        match self {
            DecimalField::Number(n) => Ok(*n),
            DecimalField::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                CatalogError::InvalidMetadata(format!("{field} is not a decimal integer: {s:?}"))
            }),
        }
    }
}

/// Metadata exactly as the camera reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMediaMetadata {
    #[serde(alias = "cre")]
    pub creation_timestamp: DecimalField,
    #[serde(alias = "s")]
    pub file_size: DecimalField,
}

impl TryFrom<RawMediaMetadata> for MediaMetadata {
    type Error = CatalogError;

    fn try_from(raw: RawMediaMetadata) -> Result<Self, Self::Error> {
        let creation_timestamp = raw.creation_timestamp.parse("creation_timestamp")?;
        let size = raw.file_size.parse("file_size")?;
        let size_bytes = u64::try_from(size).map_err(|_| {
            CatalogError::InvalidMetadata(format!("file_size is negative: {size}"))
        })?;
        Ok(Self {
            creation_timestamp,
            size_bytes,
        })
    }
}
