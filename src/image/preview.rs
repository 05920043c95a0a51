//! Local preview handles.
//!
//! A preview handle stands for a locally renderable copy of a selected image.
//! Handles are registered with a [`PreviewRegistry`] and unregister themselves
//! on drop, so superseded selections never pile up live previews.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    live: BTreeSet<u64>,
}

/// Tracks live preview handles.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<Mutex<Inner>>,
}

impl PreviewRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new handle.
    pub fn acquire(&self, name: &str) -> PreviewHandle {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.next_id += 1;
        let id = inner.next_id;
        inner.live.insert(id);
        tracing::debug!(preview_id = id, name, "acquired preview handle");

        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    /// Number of handles not yet released.
    pub fn live_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .live
            .len()
    }

    fn release(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.live.remove(&id) {
            tracing::debug!(preview_id = id, "released preview handle");
        }
    }
}

/// A registered preview. Released when dropped.
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    /// Identifier, unique within its registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Local reference string for this preview.
    pub fn url(&self) -> String {
        format!("preview://{}", self.id)
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}
