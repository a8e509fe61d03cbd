//! Shared data structures for the application state
//!
//! These structs represent the data model that flows between
//! the store layer and the UI layer. Field names on the wire follow the
//! remote collection layout (camelCase), the Rust side stays snake_case.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Collection holding water sources shown on the map
pub const WATER_SOURCE_COLLECTION: &str = "water_source";
/// Collection holding water issue reports
pub const WATER_REPORT_COLLECTION: &str = "water_report";
/// Collection holding discussion threads
pub const DISCUSSION_COLLECTION: &str = "discussions";

/// Default span used when a new source is created from the form
pub const DEFAULT_LATITUDE_DELTA: f64 = 0.0922;
pub const DEFAULT_LONGITUDE_DELTA: f64 = 0.0421;

/// Opaque identifier assigned to a record before its first write
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id without a round trip to the store
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A bare coordinate pair, as produced by a map long-press
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A map camera target: center plus span
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportRegion {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl ViewportRegion {
    pub fn center(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// A geolocated water source
#[derive(Debug, Clone, PartialEq)]
pub struct GeoEntry {
    /// Key of the record inside its collection
    pub id: EntryId,
    /// Display label, also the primary search key
    pub title: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Preferred viewport span when focusing this entry
    pub latitude_delta: f64,
    pub longitude_delta: f64,
    /// Uploaded image URIs. Empty means "show the placeholder"
    pub images: Vec<String>,
    pub up_votes: u64,
    pub down_votes: u64,
}

/// Remote field layout of a GeoEntry (everything except the key)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub up_votes: u64,
    #[serde(default)]
    pub down_votes: u64,
}

impl GeoEntry {
    /// Build an entry from a store key and its raw field map
    pub fn from_record(id: &str, fields: &Value) -> Result<Self, serde_json::Error> {
        let fields = EntryFields::deserialize(fields)?;
        Ok(Self::from_fields(EntryId::new(id), fields))
    }

    pub fn from_fields(id: EntryId, fields: EntryFields) -> Self {
        Self {
            id,
            title: fields.title,
            description: fields.description,
            latitude: fields.latitude,
            longitude: fields.longitude,
            latitude_delta: fields.latitude_delta,
            longitude_delta: fields.longitude_delta,
            images: fields.images,
            up_votes: fields.up_votes,
            down_votes: fields.down_votes,
        }
    }

    /// Field map written to the store on upsert
    pub fn to_fields(&self) -> EntryFields {
        EntryFields {
            title: self.title.clone(),
            description: self.description.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            latitude_delta: self.latitude_delta,
            longitude_delta: self.longitude_delta,
            images: self.images.clone(),
            up_votes: self.up_votes,
            down_votes: self.down_votes,
        }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self.to_fields())
    }

    /// Camera target used whenever this entry gets focus
    pub fn region(&self) -> ViewportRegion {
        ViewportRegion {
            latitude: self.latitude,
            longitude: self.longitude,
            latitude_delta: self.latitude_delta,
            longitude_delta: self.longitude_delta,
        }
    }

    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// Issue categories offered by the report form
pub const REPORT_KINDS: [&str; 7] = [
    "Contaminated or Polluted Water",
    "Unusual Taste or Smell",
    "Pipe Leakage",
    "Overflows or Blockages",
    "Broken or Damaged Pipes",
    "Health-Related Issue",
    "Other",
];

/// A water issue report filed by a user
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WaterReport {
    #[serde(skip)]
    pub id: String,
    /// One of [`REPORT_KINDS`]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub town: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub images: Vec<String>,
}

/// Categories a discussion thread can be filed under
pub const DISCUSSION_CATEGORIES: [&str; 7] = [
    "Water Quality",
    "Sanitation",
    "Education",
    "Climate",
    "Health",
    "Q&A",
    "Other",
];

/// A community discussion thread
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Discussion {
    #[serde(skip)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub likes: i64,
}

/// A comment under a discussion thread
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Comment {
    #[serde(skip)]
    pub id: String,
    pub author: String,
    pub content: String,
}

/// Records stored with their key kept outside the field map
pub trait Keyed: Sized {
    fn with_key(self, key: &str) -> Self;
}

impl Keyed for WaterReport {
    fn with_key(mut self, key: &str) -> Self {
        self.id = key.to_string();
        self
    }
}

impl Keyed for Discussion {
    fn with_key(mut self, key: &str) -> Self {
        self.id = key.to_string();
        self
    }
}

impl Keyed for Comment {
    fn with_key(mut self, key: &str) -> Self {
        self.id = key.to_string();
        self
    }
}

/// Parse one stored record into a keyed struct
pub fn parse_record<T>(key: &str, fields: &Value) -> Result<T, serde_json::Error>
where
    T: Keyed + for<'de> Deserialize<'de>,
{
    Ok(T::deserialize(fields)?.with_key(key))
}
