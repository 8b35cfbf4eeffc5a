//! Scripted in-memory camera used by the engine tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use crate::catalog::{CatalogError, MediaCatalog, MediaEntry, MediaMetadata};

pub(crate) const BASE_TIMESTAMP: i64 = 1_700_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List,
    Metadata(String),
    Download(String),
    PerformanceMode(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailKind {
    /// Connection reset mid-transfer; leaves a few bytes behind.
    Connection,
    /// Camera refused the request.
    Device,
}

#[derive(Debug, Clone, Copy)]
struct TransferScript {
    kind: FailKind,
    remaining: u32,
}

#[derive(Debug, Default)]
pub(crate) struct FakeCatalog {
    paths: Vec<String>,
    metadata: HashMap<String, MediaMetadata>,
    transfer_failures: Mutex<HashMap<String, TransferScript>>,
    metadata_failures: HashSet<String>,
    fail_listing: bool,
    fail_enable: bool,
    fail_disable: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeCatalog {
    pub(crate) fn new(paths: &[&str]) -> Self {
        Self {
            paths: paths.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Bytes the camera serves for `path`.
    pub(crate) fn content(path: &str) -> Vec<u8> {
        format!("media bytes of {path}").into_bytes()
    }

    /// Capture timestamp reported for `path` unless overridden.
    pub(crate) fn timestamp_of(&self, path: &str) -> i64 {
        self.metadata
            .get(path)
            .map(|m| m.creation_timestamp)
            .unwrap_or_else(|| {
                let index = self.paths.iter().position(|p| p == path).unwrap_or(0);
                BASE_TIMESTAMP + index as i64 * 60
            })
    }

    pub(crate) fn with_metadata(mut self, path: &str, creation_timestamp: i64, size_bytes: u64) -> Self {
        self.metadata.insert(
            path.to_string(),
            MediaMetadata {
                creation_timestamp,
                size_bytes,
            },
        );
        self
    }

    /// Fail the next `times` transfers of `path`. `u32::MAX` fails forever.
    pub(crate) fn fail_transfers(self, path: &str, kind: FailKind, times: u32) -> Self {
        self.transfer_failures.lock().unwrap().insert(
            path.to_string(),
            TransferScript {
                kind,
                remaining: times,
            },
        );
        self
    }

    pub(crate) fn fail_metadata(mut self, path: &str) -> Self {
        self.metadata_failures.insert(path.to_string());
        self
    }

    pub(crate) fn fail_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub(crate) fn fail_performance_mode(mut self, enable: bool, disable: bool) -> Self {
        self.fail_enable = enable;
        self.fail_disable = disable;
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn download_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Download(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn metadata_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Metadata(_)))
            .count()
    }

    pub(crate) fn performance_mode_calls(&self) -> Vec<bool> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::PerformanceMode(on) => Some(on),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_transfer_failure(&self, path: &str) -> Option<FailKind> {
        let mut scripts = self.transfer_failures.lock().unwrap();
        let script = scripts.get_mut(path)?;
        if script.remaining == 0 {
            return None;
        }
        if script.remaining != u32::MAX {
            script.remaining -= 1;
        }
        Some(script.kind)
    }
}

#[async_trait::async_trait]
impl MediaCatalog for FakeCatalog {
    async fn list_media(&self) -> Result<Vec<MediaEntry>, CatalogError> {
        self.record(Call::List);
        if self.fail_listing {
            return Err(CatalogError::Connection("media list timed out".into()));
        }
        Ok(self.paths.iter().map(|p| MediaEntry::new(p.as_str())).collect())
    }

    async fn media_metadata(&self, path: &str) -> Result<MediaMetadata, CatalogError> {
        self.record(Call::Metadata(path.to_string()));
        if self.metadata_failures.contains(path) {
            return Err(CatalogError::Device {
                path: path.to_string(),
                reason: "media info unavailable".into(),
            });
        }
        Ok(self.metadata.get(path).copied().unwrap_or(MediaMetadata {
            creation_timestamp: self.timestamp_of(path),
            size_bytes: Self::content(path).len() as u64,
        }))
    }

    async fn download(&self, path: &str, local_destination: &Path) -> Result<(), CatalogError> {
        self.record(Call::Download(path.to_string()));
        match self.next_transfer_failure(path) {
            Some(FailKind::Connection) => {
                tokio::fs::write(local_destination, b"partial").await?;
                Err(CatalogError::Connection("connection reset by peer".into()))
            }
            Some(FailKind::Device) => Err(CatalogError::Device {
                path: path.to_string(),
                reason: "file busy".into(),
            }),
            None => {
                tokio::fs::write(local_destination, Self::content(path)).await?;
                Ok(())
            }
        }
    }

    async fn set_performance_mode(&self, enabled: bool) -> Result<(), CatalogError> {
        self.record(Call::PerformanceMode(enabled));
        if (enabled && self.fail_enable) || (!enabled && self.fail_disable) {
            return Err(CatalogError::Device {
                path: String::new(),
                reason: "turbo transfer toggle rejected".into(),
            });
        }
        Ok(())
    }
}
