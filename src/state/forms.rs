use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

use super::blob::{upload_photos, BlobError, BlobStore};
use super::data::{
    Coordinate, EntryId, GeoEntry, WaterReport, DEFAULT_LATITUDE_DELTA, DEFAULT_LONGITUDE_DELTA,
    REPORT_KINDS, WATER_REPORT_COLLECTION, WATER_SOURCE_COLLECTION,
};
use super::library::{EntryStore, StoreError};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("a name is required")]
    MissingTitle,
    #[error("`{0}` is not a valid latitude")]
    InvalidLatitude(String),
    #[error("`{0}` is not a valid longitude")]
    InvalidLongitude(String),
    #[error("unknown report kind `{0}`")]
    UnknownReportKind(String),
    #[error(transparent)]
    Upload(#[from] BlobError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn parse_degrees(text: &str, limit: f64) -> Option<f64> {
    let value: f64 = text.trim().parse().ok()?;
    (value.is_finite() && value.abs() <= limit).then_some(value)
}

/// The "add water source" form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceDraft {
    pub title: String,
    pub latitude: String,
    pub longitude: String,
    pub description: String,
    /// Local files picked by the user, uploaded on submit
    pub photos: Vec<PathBuf>,
}

impl SourceDraft {
    /// Form opened from a map long-press
    pub fn from_long_press(point: Coordinate) -> Self {
        Self {
            latitude: point.latitude.to_string(),
            longitude: point.longitude.to_string(),
            ..Self::default()
        }
    }

    fn coordinate(&self) -> Result<Coordinate, FormError> {
        if self.title.trim().is_empty() {
            return Err(FormError::MissingTitle);
        }
        let latitude = parse_degrees(&self.latitude, 90.0)
            .ok_or_else(|| FormError::InvalidLatitude(self.latitude.clone()))?;
        let longitude = parse_degrees(&self.longitude, 180.0)
            .ok_or_else(|| FormError::InvalidLongitude(self.longitude.clone()))?;
        Ok(Coordinate {
            latitude,
            longitude,
        })
    }

    /// Check the fields and turn them into a new entry using `images`
    pub fn build(&self, images: Vec<String>) -> Result<GeoEntry, FormError> {
        let point = self.coordinate()?;
        Ok(GeoEntry {
            id: EntryId::generate(),
            title: self.title.trim().to_string(),
            description: self.description.clone(),
            latitude: point.latitude,
            longitude: point.longitude,
            latitude_delta: DEFAULT_LATITUDE_DELTA,
            longitude_delta: DEFAULT_LONGITUDE_DELTA,
            images,
            up_votes: 0,
            down_votes: 0,
        })
    }

    /// Validate, upload the photos and build the entry. The record is only
    /// built once every upload returned its URI.
    pub async fn submit(self, blobs: &dyn BlobStore) -> Result<GeoEntry, FormError> {
        self.coordinate()?;
        let images = upload_photos(blobs, self.photos.clone()).await?;
        self.build(images)
    }
}

/// Write a water source. Failures are logged and returned, never retried.
pub fn save_source(store: &dyn EntryStore, entry: &GeoEntry) -> Result<(), FormError> {
    let fields = entry.to_json().map_err(StoreError::from)?;
    match store.upsert(WATER_SOURCE_COLLECTION, entry.id.as_str(), &fields) {
        Ok(()) => {
            info!(id = %entry.id, title = %entry.title, "water source saved");
            Ok(())
        }
        Err(e) => {
            error!(id = %entry.id, error = %e, "water source write failed");
            Err(e.into())
        }
    }
}

pub fn delete_source(store: &dyn EntryStore, id: &EntryId) -> Result<(), FormError> {
    store
        .delete(WATER_SOURCE_COLLECTION, id.as_str())
        .inspect(|_| info!(%id, "water source deleted"))
        .inspect_err(|e| error!(%id, error = %e, "water source deletion failed"))
        .map_err(FormError::from)
}

/// The water issue report form
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDraft {
    /// One of [`REPORT_KINDS`]
    pub kind: String,
    pub description: String,
    pub town: String,
    pub district: String,
    pub photos: Vec<PathBuf>,
}

impl Default for ReportDraft {
    fn default() -> Self {
        Self {
            kind: REPORT_KINDS[0].to_string(),
            description: String::new(),
            town: String::new(),
            district: String::new(),
            photos: Vec::new(),
        }
    }
}

impl ReportDraft {
    fn check(&self) -> Result<(), FormError> {
        if REPORT_KINDS.contains(&self.kind.as_str()) {
            Ok(())
        } else {
            Err(FormError::UnknownReportKind(self.kind.clone()))
        }
    }

    pub fn build(&self, images: Vec<String>) -> Result<WaterReport, FormError> {
        self.check()?;
        Ok(WaterReport {
            id: EntryId::generate().to_string(),
            title: self.kind.clone(),
            description: self.description.clone(),
            town: self.town.trim().to_string(),
            district: self.district.trim().to_string(),
            images,
        })
    }

    pub async fn submit(self, blobs: &dyn BlobStore) -> Result<WaterReport, FormError> {
        self.check()?;
        let images = upload_photos(blobs, self.photos.clone()).await?;
        self.build(images)
    }
}

pub fn save_report(store: &dyn EntryStore, report: &WaterReport) -> Result<(), FormError> {
    let fields = serde_json::to_value(report).map_err(StoreError::from)?;
    store
        .upsert(WATER_REPORT_COLLECTION, &report.id, &fields)
        .inspect(|_| info!(id = %report.id, "water report saved"))
        .inspect_err(|e| error!(id = %report.id, error = %e, "water report write failed"))
        .map_err(FormError::from)
}

pub fn delete_report(store: &dyn EntryStore, id: &str) -> Result<(), FormError> {
    store
        .delete(WATER_REPORT_COLLECTION, id)
        .inspect_err(|e| error!(id, error = %e, "water report deletion failed"))
        .map_err(FormError::from)
}
