use std::time::Duration;
use tracing::debug;

use super::data::{Coordinate, GeoEntry, ViewportRegion};
use super::index::EntryIndex;
use super::selection::{Origin, SelectionChange};

/// How long the map takes to fly to a new region
pub const DEFAULT_ANIMATION: Duration = Duration::from_millis(1000);

/// What triggered a camera move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSource {
    FocusedLocation,
    Selection,
    Search,
}

/// A camera animation the map surface should start
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraRequest {
    /// Issue order. Only the highest ticket may settle the camera.
    pub ticket: u64,
    pub region: ViewportRegion,
    pub source: CameraSource,
    pub duration: Duration,
}

/// Decides where the map camera goes.
///
/// Three sources feed it: a focused location override, selection changes
/// and search navigation. The last issued request wins; completions of
/// superseded animations are ignored.
#[derive(Debug, Clone)]
pub struct ViewportController {
    next_ticket: u64,
    latest_ticket: Option<u64>,
    target: Option<ViewportRegion>,
    settled: Option<ViewportRegion>,
    focused: Option<ViewportRegion>,
    duration: Duration,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(DEFAULT_ANIMATION)
    }
}

impl ViewportController {
    pub fn new(duration: Duration) -> Self {
        Self {
            next_ticket: 0,
            latest_ticket: None,
            target: None,
            settled: None,
            focused: None,
            duration,
        }
    }

    /// Region of the most recent request, finished or not
    pub fn target(&self) -> Option<ViewportRegion> {
        self.target
    }

    /// Region reached by the latest animation that completed
    pub fn settled(&self) -> Option<ViewportRegion> {
        self.settled
    }

    pub fn focused_location(&self) -> Option<ViewportRegion> {
        self.focused
    }

    fn request(&mut self, region: ViewportRegion, source: CameraSource) -> Option<CameraRequest> {
        if self.target == Some(region) {
            debug!(?source, "camera already heading to region");
            return None;
        }
        self.next_ticket += 1;
        self.latest_ticket = Some(self.next_ticket);
        self.target = Some(region);
        Some(CameraRequest {
            ticket: self.next_ticket,
            region,
            source,
            duration: self.duration,
        })
    }

    /// Set or clear the externally supplied focus. While present it takes
    /// precedence over selection driven moves.
    pub fn set_focused_location(&mut self, region: Option<ViewportRegion>) -> Option<CameraRequest> {
        if self.focused == region {
            return None;
        }
        self.focused = region;
        self.request(region?, CameraSource::FocusedLocation)
    }

    /// Follow a selection change. Unknown ids are a silent no-op.
    pub fn follow_selection(
        &mut self,
        change: &SelectionChange,
        index: &EntryIndex,
    ) -> Option<CameraRequest> {
        if change.origin == Origin::Search {
            // search navigation already moved the camera
            return None;
        }
        if self.focused.is_some() {
            debug!(id = %change.id, "focused location active, selection move skipped");
            return None;
        }
        let entry = index.get(&change.id)?;
        self.request(entry.region(), CameraSource::Selection)
    }

    /// Fly to an exact search match or a chosen suggestion
    pub fn focus_search(&mut self, entry: &GeoEntry) -> Option<CameraRequest> {
        self.request(entry.region(), CameraSource::Search)
    }

    /// The map reports an animation finished. Returns `false` for
    /// superseded tickets, which must not move the settled camera.
    pub fn finish(&mut self, ticket: u64) -> bool {
        if self.latest_ticket != Some(ticket) {
            debug!(ticket, latest = ?self.latest_ticket, "stale camera animation ignored");
            return false;
        }
        self.settled = self.target;
        true
    }

    /// The user panned or zoomed by hand, so the next request for the old
    /// target has to animate again.
    pub fn user_moved(&mut self, region: ViewportRegion) {
        self.latest_ticket = None;
        self.target = Some(region);
        self.settled = Some(region);
    }
}

/// Long-press on the map: hand the raw coordinate to the creation form.
/// Nothing beyond the presence of a coordinate is checked.
pub fn long_press(point: Option<Coordinate>) -> Option<Coordinate> {
    let point = point?;
    debug!(latitude = point.latitude, longitude = point.longitude, "long press");
    Some(Coordinate {
        latitude: point.latitude,
        longitude: point.longitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::EntryId;
    use crate::state::index::tests::cities;
    use crate::state::selection::SelectionState;

    fn region(latitude: f64, longitude: f64) -> ViewportRegion {
        ViewportRegion {
            latitude,
            longitude,
            latitude_delta: 0.05,
            longitude_delta: 0.0421,
        }
    }

    #[test]
    fn test_selection_moves_camera() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut viewport = ViewportController::default();

        let change = selection.set(EntryId::new("1"), Origin::Carousel).unwrap();
        let request = viewport.follow_selection(&change, &index).unwrap();

        assert_eq!(request.source, CameraSource::Selection);
        assert_eq!(request.region, index.at(0).unwrap().region());
        assert_eq!(request.duration, DEFAULT_ANIMATION);
    }

    #[test]
    fn test_unknown_selection_is_ignored() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut viewport = ViewportController::default();

        let change = selection.set(EntryId::new("gone"), Origin::External).unwrap();

        assert!(viewport.follow_selection(&change, &index).is_none());
        assert!(viewport.target().is_none());
    }

    #[test]
    fn test_same_target_twice_animates_once() {
        let index = cities();
        let entry = index.at(2).unwrap();
        let mut viewport = ViewportController::default();

        assert!(viewport.focus_search(entry).is_some());
        assert!(viewport.focus_search(entry).is_none());
    }

    #[test]
    fn test_search_originated_selection_is_skipped() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut viewport = ViewportController::default();

        let change = selection.set(EntryId::new("3"), Origin::Search).unwrap();

        assert!(viewport.follow_selection(&change, &index).is_none());
    }

    #[test]
    fn test_focused_location_takes_precedence() {
        let index = cities();
        let mut selection = SelectionState::new();
        let mut viewport = ViewportController::default();

        let focus = region(6.9143498, 79.972684);
        let request = viewport.set_focused_location(Some(focus)).unwrap();
        assert_eq!(request.source, CameraSource::FocusedLocation);
        assert!(viewport.set_focused_location(Some(focus)).is_none());

        let change = selection.set(EntryId::new("2"), Origin::Map).unwrap();
        assert!(viewport.follow_selection(&change, &index).is_none());

        assert!(viewport.set_focused_location(None).is_none());
        let change = selection.set(EntryId::new("4"), Origin::Map).unwrap();
        assert!(viewport.follow_selection(&change, &index).is_some());
    }

    #[test]
    fn test_last_request_wins() {
        let index = cities();
        let mut viewport = ViewportController::default();

        let first = viewport.focus_search(index.at(0).unwrap()).unwrap();
        let second = viewport.focus_search(index.at(1).unwrap()).unwrap();
        assert!(second.ticket > first.ticket);

        // the slow first animation finishes after the second one was issued
        assert!(!viewport.finish(first.ticket));
        assert!(viewport.settled().is_none());

        assert!(viewport.finish(second.ticket));
        assert_eq!(viewport.settled(), Some(index.at(1).unwrap().region()));
    }

    #[test]
    fn test_user_pan_allows_refocus() {
        let index = cities();
        let entry = index.at(0).unwrap();
        let mut viewport = ViewportController::default();

        let request = viewport.focus_search(entry).unwrap();
        viewport.finish(request.ticket);
        viewport.user_moved(region(0.0, 0.0));

        assert!(viewport.focus_search(entry).is_some());
    }

    #[test]
    fn test_long_press_passes_coordinates() {
        let point = Coordinate {
            latitude: 6.9,
            longitude: 79.9,
        };

        assert_eq!(long_press(Some(point)), Some(point));
        assert_eq!(long_press(None), None);
    }
}
