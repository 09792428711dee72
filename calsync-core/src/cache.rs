//! Optimistic notification hooks for the UI layer.

use crate::records::{LocalBusytime, LocalEvent};

/// Receives records as soon as they are queued, before commit.
///
/// Fire-and-forget: implementations cannot fail the sync, and a session
/// without a cache behaves identically apart from these calls.
pub trait UiCache: Send + Sync {
    fn cache_event(&self, event: &LocalEvent);
    fn cache_busytime(&self, busytime: &LocalBusytime);
}
