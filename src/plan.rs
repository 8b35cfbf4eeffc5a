//! Decide which camera files are new since the last sync.
//!
//! Ordering is plain byte-wise comparison of the full remote path
//! (`<folder>/<filename>`). This matches the camera's naming well enough in
//! practice but is not chronological: when a filename counter wraps
//! (`GX019999.MP4` followed by `GX010001.MP4` in the next folder) the folder
//! component usually keeps the order correct, but a folder counter reset
//! will sort newer files below the watermark and they will not be planned.
//! Capture timestamps would fix that, at the cost of a metadata round trip
//! per file before planning; that is a behavior change and is not done here.

use std::cmp::Ordering;

use crate::catalog::MediaEntry;
use crate::state::Watermark;

/// The single ordering used for both sorting and watermark comparison.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}

/// Return the entries that sort strictly after `watermark`, in ascending
/// order. With no watermark, every entry is returned.
///
/// Duplicate paths in the listing are collapsed to one entry.
pub fn plan(mut catalog: Vec<MediaEntry>, watermark: Option<&Watermark>) -> Vec<MediaEntry> {
    catalog.sort_by(|a, b| compare_paths(&a.path, &b.path));
    catalog.dedup_by(|a, b| a.path == b.path);

    match watermark {
        Some(mark) => catalog
            .into_iter()
            .filter(|entry| compare_paths(&entry.path, mark.as_str()) == Ordering::Greater)
            .collect(),
        None => catalog,
    }
}
