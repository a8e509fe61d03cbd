//! The single focused entry shared by the map and the carousel.
//!
//! Owned by the screen root and handed to both views. Every change carries
//! the origin of the event that caused it so each view can tell its own
//! echoes apart from changes it has to follow.

use super::data::EntryId;

/// Who asked for a selection change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A marker on the map was pressed
    Map,
    /// The carousel settled on a page after a user swipe
    Carousel,
    /// An exact search match or a chosen suggestion
    Search,
    /// Set by the embedding screen
    External,
}

/// An accepted selection change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub id: EntryId,
    pub origin: Origin,
    /// Monotonic counter, bumped on every accepted change
    pub version: u64,
}

#[derive(Debug, Default, Clone)]
pub struct SelectionState {
    current: Option<EntryId>,
    version: u64,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&EntryId> {
        self.current.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Overwrite the selection. Setting the id that is already selected is
    /// not a change and returns `None`.
    pub fn set(&mut self, id: EntryId, origin: Origin) -> Option<SelectionChange> {
        if self.current.as_ref() == Some(&id) {
            return None;
        }
        self.version += 1;
        self.current = Some(id.clone());
        Some(SelectionChange {
            id,
            origin,
            version: self.version,
        })
    }

    pub fn is_selected(&self, id: &EntryId) -> bool {
        self.current.as_ref() == Some(id)
    }
}
