//! Camera "turbo transfer" mode around a batch of downloads.
//!
//! The mode speeds up bulk transfers but must not stay on after the batch,
//! whatever happened to the individual files. [`PerformanceMode`] is a scope
//! guard: [`PerformanceMode::release`] turns the mode off explicitly, and
//! dropping an unreleased guard (panic, or the sync future being dropped)
//! schedules a best-effort disable on the runtime.

use std::future::Future;
use std::sync::Arc;

use crate::catalog::{CatalogError, MediaCatalog};

pub struct PerformanceMode {
    catalog: Arc<dyn MediaCatalog>,
    enable_error: Option<CatalogError>,
    released: bool,
}

impl PerformanceMode {
    /// Ask the camera to enable the mode.
    ///
    /// A failure is kept on the guard rather than returned: transfers still
    /// work without the mode, and the guard must exist either way so the
    /// disable side runs.
    pub async fn enable(catalog: Arc<dyn MediaCatalog>) -> Self {
        let enable_error = match catalog.set_performance_mode(true).await {
            Ok(()) => {
                tracing::debug!("Turbo transfer enabled");
                None
            }
            Err(e) => {
                tracing::warn!("Could not enable turbo transfer, continuing without it: {}", e);
                Some(e)
            }
        };
        Self {
            catalog,
            enable_error,
            released: false,
        }
    }

    pub fn take_enable_error(&mut self) -> Option<CatalogError> {
        self.enable_error.take()
    }

    /// Disable the mode. Always sent, even if enabling failed, since the
    /// toggle is idempotent on the camera.
    pub async fn release(mut self) -> Result<(), CatalogError> {
        self.released = true;
        let result = self.catalog.set_performance_mode(false).await;
        match &result {
            Ok(()) => tracing::debug!("Turbo transfer disabled"),
            Err(e) => tracing::warn!("Could not disable turbo transfer: {}", e),
        }
        result
    }
}

impl Drop for PerformanceMode {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Turbo transfer left enabled: no runtime to disable it");
            return;
        };
        let catalog = self.catalog.clone();
        handle.spawn(async move {
            if let Err(e) = catalog.set_performance_mode(false).await {
                tracing::warn!("Could not disable turbo transfer: {}", e);
            }
        });
    }
}

/// Outcome of [`with_performance_mode`]: the body's value plus any toggle
/// failures, which never replace the body's own result.
#[derive(Debug)]
pub struct Bracketed<T> {
    pub value: T,
    pub enable_error: Option<CatalogError>,
    pub disable_error: Option<CatalogError>,
}

/// Run `body` with the performance mode enabled, and disable it exactly once
/// afterwards regardless of what `body` produced.
pub async fn with_performance_mode<F, Fut, T>(catalog: Arc<dyn MediaCatalog>, body: F) -> Bracketed<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let mut mode = PerformanceMode::enable(catalog).await;
    let enable_error = mode.take_enable_error();
    let value = body().await;
    let disable_error = mode.release().await.err();
    Bracketed {
        value,
        enable_error,
        disable_error,
    }
}
