use std::collections::VecDeque;
use tracing::debug;

use super::data::EntryId;
use super::index::EntryIndex;
use super::selection::{Origin, SelectionChange, SelectionState};

/// Programmatic scroll the carousel should perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollRequest {
    pub index: usize,
}

/// Keeps the paged card view and the selection in step.
///
/// Selection changes from elsewhere scroll the carousel; a user swipe that
/// settles on a new page publishes that page's id. A settle caused by our
/// own scroll is swallowed so it never comes back as a user selection.
#[derive(Debug, Default, Clone)]
pub struct CarouselSync {
    page: Option<usize>,
    /// Targets of scrolls we asked for that haven't settled yet, oldest first
    pending_scrolls: VecDeque<usize>,
}

impl CarouselSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page the carousel currently rests on
    pub fn page(&self) -> Option<usize> {
        self.page
    }

    /// Page the carousel ends up on once every pending scroll has landed
    pub fn destination(&self) -> Option<usize> {
        self.pending_scrolls.back().copied().or(self.page)
    }

    fn scroll_to(&mut self, index: usize) -> Option<ScrollRequest> {
        if self.destination() == Some(index) {
            return None;
        }
        self.pending_scrolls.push_back(index);
        Some(ScrollRequest { index })
    }

    /// Scroll to the newly selected entry. Unknown ids don't scroll.
    pub fn follow_selection(
        &mut self,
        change: &SelectionChange,
        index: &EntryIndex,
    ) -> Option<ScrollRequest> {
        if change.origin == Origin::Carousel {
            return None;
        }
        let position = index.position(&change.id)?;
        self.scroll_to(position)
    }

    /// The carousel came to rest on `page`. Returns the id to publish as the
    /// new selection, or `None` for echoes of our own scrolls, pages already
    /// matching the selection and out of range pages.
    ///
    /// Scrolls settle in the order they were issued, so landing on a pending
    /// target also retires every scroll issued before it.
    pub fn page_settled(
        &mut self,
        page: usize,
        index: &EntryIndex,
        selection: &SelectionState,
    ) -> Option<EntryId> {
        self.page = Some(page);
        if let Some(position) = self.pending_scrolls.iter().position(|&target| target == page) {
            self.pending_scrolls.drain(..=position);
            debug!(page, still_pending = self.pending_scrolls.len(), "programmatic scroll settled");
            return None;
        }
        // a swipe overrides whatever we were scrolling to
        self.pending_scrolls.clear();
        let entry = index.at(page)?;
        if selection.is_selected(&entry.id) {
            return None;
        }
        Some(entry.id.clone())
    }

    /// Re-align after the index was replaced by a new snapshot
    pub fn reconcile(&mut self, index: &EntryIndex, selection: &SelectionState) -> Option<ScrollRequest> {
        if index.is_empty() {
            self.page = None;
            self.pending_scrolls.clear();
            return None;
        }
        if let Some(page) = self.page {
            if page >= index.len() {
                self.page = Some(index.len() - 1);
            }
        }
        self.pending_scrolls.retain(|&target| target < index.len());
        let position = index.position(selection.current()?)?;
        self.scroll_to(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::index::tests::cities;

    #[test]
    fn test_external_selection_scrolls() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut carousel = CarouselSync::new();

        let change = selection.set(EntryId::new("4"), Origin::Map).unwrap();

        assert_eq!(
            carousel.follow_selection(&change, &index),
            Some(ScrollRequest { index: 3 })
        );
    }

    #[test]
    fn test_unknown_selection_does_not_scroll() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut carousel = CarouselSync::new();

        let change = selection.set(EntryId::new("missing"), Origin::External).unwrap();

        assert!(carousel.follow_selection(&change, &index).is_none());
    }

    #[test]
    fn test_user_swipe_publishes_id() {
        let index = cities();
        let selection = SelectionState::new();
        let mut carousel = CarouselSync::new();

        assert_eq!(
            carousel.page_settled(2, &index, &selection),
            Some(EntryId::new("3"))
        );
        assert_eq!(carousel.page(), Some(2));
    }

    #[test]
    fn test_own_selection_is_not_scrolled_back() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut carousel = CarouselSync::new();

        let id = carousel.page_settled(1, &index, &selection).unwrap();
        let change = selection.set(id, Origin::Carousel).unwrap();

        assert!(carousel.follow_selection(&change, &index).is_none());
        assert!(carousel.page_settled(1, &index, &selection).is_none());
    }

    #[test]
    fn test_programmatic_scroll_is_not_echoed() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut carousel = CarouselSync::new();

        let change = selection.set(EntryId::new("5"), Origin::Map).unwrap();
        let request = carousel.follow_selection(&change, &index).unwrap();

        assert!(carousel.page_settled(request.index, &index, &selection).is_none());
        assert_eq!(carousel.page(), Some(4));
    }

    #[test]
    fn test_out_of_range_page() {
        let index = cities();
        let selection = SelectionState::new();
        let mut carousel = CarouselSync::new();

        assert!(carousel.page_settled(9, &index, &selection).is_none());
    }

    #[test]
    fn test_empty_index_is_a_no_op() {
        let index = EntryIndex::new();
        let mut selection = SelectionState::new();
        let mut carousel = CarouselSync::new();

        let change = selection.set(EntryId::new("1"), Origin::Map).unwrap();

        assert!(carousel.follow_selection(&change, &index).is_none());
        assert!(carousel.page_settled(0, &index, &selection).is_none());
        assert!(carousel.reconcile(&index, &selection).is_none());
        assert!(carousel.page().is_none());
    }

    #[test]
    fn test_reconcile_after_reorder() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut carousel = CarouselSync::new();
        let id = carousel.page_settled(0, &index, &selection).unwrap();
        selection.set(id, Origin::Carousel);

        // San Francisco moves to the back in the next snapshot
        let mut entries = index.entries().to_vec();
        entries.rotate_left(1);
        let reordered = EntryIndex::from_entries(entries);

        assert_eq!(
            carousel.reconcile(&reordered, &selection),
            Some(ScrollRequest { index: 4 })
        );
    }

    #[test]
    fn test_scroll_back_while_previous_scroll_in_flight() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut carousel = CarouselSync::new();
        let id = carousel.page_settled(0, &index, &selection).unwrap();
        selection.set(id, Origin::Carousel);

        let to_second = selection.set(EntryId::new("2"), Origin::Map).unwrap();
        assert_eq!(
            carousel.follow_selection(&to_second, &index),
            Some(ScrollRequest { index: 1 })
        );
        // back to the first entry before the scroll to page 1 has landed
        let to_first = selection.set(EntryId::new("1"), Origin::Map).unwrap();
        assert_eq!(
            carousel.follow_selection(&to_first, &index),
            Some(ScrollRequest { index: 0 })
        );

        assert!(carousel.page_settled(1, &index, &selection).is_none());
        assert_eq!(carousel.destination(), Some(0));
        assert!(carousel.page_settled(0, &index, &selection).is_none());

        assert_eq!(index.at(carousel.page().unwrap()).unwrap().id, EntryId::new("1"));
        assert_eq!(selection.current(), Some(&EntryId::new("1")));
        assert_eq!(carousel.destination(), Some(0));
    }

    #[test]
    fn test_swipe_cancels_pending_scrolls() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut carousel = CarouselSync::new();

        let change = selection.set(EntryId::new("4"), Origin::Map).unwrap();
        carousel.follow_selection(&change, &index).unwrap();

        assert_eq!(carousel.page_settled(1, &index, &selection), Some(EntryId::new("2")));
        assert_eq!(carousel.destination(), Some(1));
    }
}
