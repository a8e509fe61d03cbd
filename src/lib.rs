//! Water source map: search, map camera and carousel kept in step over a
//! subscribed collection store, plus reports, votes and discussions.

pub mod config;
pub mod state;

pub use state::data::{Coordinate, EntryId, GeoEntry, ViewportRegion};
pub use state::sync::{Effect, GeoSync};
