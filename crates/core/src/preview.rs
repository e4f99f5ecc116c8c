//! Displayable preview references for captured photos.
//!
//! A [`PreviewHandle`] stands in for a browser object URL: it must be
//! released exactly once when its slot is cleared, replaced, or the
//! session resets. Handles are not `Clone` and [`PreviewRegistry::release`]
//! consumes them, so a double release cannot be expressed.

use std::collections::HashSet;

/// URL scheme of preview references.
pub const PREVIEW_SCHEME: &str = "preview";

/// An owned reference to one live preview.
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    id: u64,
    url: String,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Displayable reference, e.g. `preview://7/front.jpg`.
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Issues and reclaims preview handles. Owned by the store.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_id: u64,
    live: HashSet<u64>,
    released: u64,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, file_name: &str) -> PreviewHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id);
        PreviewHandle {
            id,
            url: format!("{PREVIEW_SCHEME}://{id}/{file_name}"),
        }
    }

    pub fn release(&mut self, handle: PreviewHandle) {
        if self.live.remove(&handle.id) {
            self.released += 1;
            tracing::trace!(preview_id = handle.id, "Preview released");
        } else {
            tracing::warn!(preview_id = handle.id, "Release of unknown preview handle");
        }
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.contains(&handle.id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Total handles released over the registry's lifetime.
    pub fn released_count(&self) -> u64 {
        self.released
    }
}
