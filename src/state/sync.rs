use std::time::Duration;
use tracing::debug;

use super::carousel::{CarouselSync, ScrollRequest};
use super::data::{Coordinate, EntryId, GeoEntry, ViewportRegion};
use super::index::EntryIndex;
use super::library::{Snapshot, StoreError};
use super::search::{SearchFilter, DEFAULT_MIN_QUERY_CHARS};
use super::selection::{Origin, SelectionChange, SelectionState};
use super::viewport::{self, CameraRequest, ViewportController, DEFAULT_ANIMATION};

/// Work the embedding UI has to carry out after an input
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start flying the map camera
    AnimateCamera(CameraRequest),
    /// Scroll the carousel without treating the result as a user swipe
    ScrollCarousel(ScrollRequest),
    /// Open the creation form prefilled with these coordinates
    OpenCreationForm(Coordinate),
}

/// Root of the map screen state.
///
/// Owns the entry index and the selection and routes every input through
/// search, viewport and carousel. The selection is the only state the map
/// and the carousel share.
#[derive(Debug, Clone)]
pub struct GeoSync {
    index: EntryIndex,
    selection: SelectionState,
    search: SearchFilter,
    viewport: ViewportController,
    carousel: CarouselSync,
}

impl Default for GeoSync {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_QUERY_CHARS, DEFAULT_ANIMATION)
    }
}

impl GeoSync {
    pub fn new(min_query_chars: usize, animation: Duration) -> Self {
        Self {
            index: EntryIndex::new(),
            selection: SelectionState::new(),
            search: SearchFilter::new(min_query_chars),
            viewport: ViewportController::new(animation),
            carousel: CarouselSync::new(),
        }
    }

    pub fn index(&self) -> &EntryIndex {
        &self.index
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn carousel(&self) -> &CarouselSync {
        &self.carousel
    }

    pub fn query(&self) -> &str {
        self.search.query()
    }

    pub fn suggestions(&self) -> Vec<&GeoEntry> {
        self.search.suggestions(&self.index)
    }

    pub fn selected_entry(&self) -> Option<&GeoEntry> {
        self.index.get(self.selection.current()?)
    }

    /// Feed one subscription delivery. Failures keep the previous snapshot.
    pub fn apply_snapshot(&mut self, event: Result<Snapshot, StoreError>) -> Vec<Effect> {
        if !self.index.on_event(event) {
            return Vec::new();
        }
        debug!(entries = self.index.len(), "water sources replaced");

        // Suggestions follow the new data; an exact match doesn't pull the
        // camera back on every snapshot.
        self.search.refresh(&self.index);

        let mut effects = Vec::new();
        if let Some(id) = self.selection.current().cloned() {
            let change = SelectionChange {
                id,
                origin: Origin::External,
                version: self.selection.version(),
            };
            effects.extend(self.viewport.follow_selection(&change, &self.index).map(Effect::AnimateCamera));
        }
        effects.extend(
            self.carousel
                .reconcile(&self.index, &self.selection)
                .map(Effect::ScrollCarousel),
        );
        effects
    }

    /// The search text changed
    pub fn set_query(&mut self, query: impl Into<String>) -> Vec<Effect> {
        match self.search.set_query(query, &self.index) {
            Some(id) => self.navigate_search(id),
            None => Vec::new(),
        }
    }

    /// A suggestion from the dropdown was picked
    pub fn choose_suggestion(&mut self, id: &EntryId) -> Vec<Effect> {
        match self.search.choose(id, &self.index) {
            Some(id) => self.navigate_search(id),
            None => Vec::new(),
        }
    }

    fn navigate_search(&mut self, id: EntryId) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(entry) = self.index.get(&id) {
            effects.extend(self.viewport.focus_search(entry).map(Effect::AnimateCamera));
        }
        effects.extend(self.select(id, Origin::Search));
        effects
    }

    /// A marker was pressed on the map
    pub fn marker_pressed(&mut self, id: EntryId) -> Vec<Effect> {
        self.select(id, Origin::Map)
    }

    /// Overwrite the selection and let both views follow
    pub fn select(&mut self, id: EntryId, origin: Origin) -> Vec<Effect> {
        let Some(change) = self.selection.set(id, origin) else {
            return Vec::new();
        };
        let mut effects = Vec::new();
        effects.extend(
            self.viewport
                .follow_selection(&change, &self.index)
                .map(Effect::AnimateCamera),
        );
        effects.extend(
            self.carousel
                .follow_selection(&change, &self.index)
                .map(Effect::ScrollCarousel),
        );
        effects
    }

    /// The carousel came to rest on `page`
    pub fn page_settled(&mut self, page: usize) -> Vec<Effect> {
        match self.carousel.page_settled(page, &self.index, &self.selection) {
            Some(id) => self.select(id, Origin::Carousel),
            None => Vec::new(),
        }
    }

    pub fn set_focused_location(&mut self, region: Option<ViewportRegion>) -> Vec<Effect> {
        self.viewport
            .set_focused_location(region)
            .map(Effect::AnimateCamera)
            .into_iter()
            .collect()
    }

    pub fn long_press(&mut self, point: Option<Coordinate>) -> Vec<Effect> {
        viewport::long_press(point)
            .map(Effect::OpenCreationForm)
            .into_iter()
            .collect()
    }

    /// The map finished the animation with `ticket`
    pub fn animation_finished(&mut self, ticket: u64) -> bool {
        self.viewport.finish(ticket)
    }

    pub fn camera_moved_by_user(&mut self, region: ViewportRegion) {
        self.viewport.user_moved(region);
    }
}
