//! # Background Sync Registration
//!
//! Some hosts can wake the application later to finish syncing (a service
//! worker, a mobile background task). The queue asks for such a wake-up on
//! every queued mutation; hosts without the capability use [`NoopRegistrar`].
//!
//! When the host reports that its background sync fired, it calls
//! `ConnectivityTriggers::notify_background_sync_complete`, which drains.

use crate::shared::error::SyncError;

/// Tag requested by the queue for every queued mutation
pub const SYNC_TAG: &str = "sync-mutations";

/// Host hook for requesting a deferred background sync
pub trait BackgroundSyncRegistrar: Send + Sync {
    /// Ask the host to run a background sync for `tag`
    ///
    /// Failures are logged by the caller and never fail the queue operation.
    fn request_sync(&self, tag: &str) -> Result<(), SyncError>;
}

/// Registrar for hosts without background sync
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistrar;

impl BackgroundSyncRegistrar for NoopRegistrar {
    fn request_sync(&self, tag: &str) -> Result<(), SyncError> {
        tracing::trace!(tag, "Background sync not available on this host");
        Ok(())
    }
}
