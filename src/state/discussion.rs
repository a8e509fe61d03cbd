use serde_json::{json, Map, Value};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

use super::blob::{upload_photos, BlobError, BlobStore};
use super::data::{parse_record, Comment, Discussion, Keyed, WaterReport, DISCUSSION_COLLECTION};
use super::library::{EntryStore, Snapshot, StoreError};

/// Image shown on a report card when the report has no photos
pub const PLACEHOLDER_IMAGE: &str = "default_image_url";

#[derive(Debug, Error)]
pub enum DiscussionError {
    #[error("you need to be logged in to post")]
    NotSignedIn,
    #[error("a title is required")]
    MissingTitle,
    #[error("please select a category")]
    MissingCategory,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parse every record of a collection, skipping the ones that don't fit
pub fn parse_collection<T>(snapshot: &Snapshot) -> Vec<T>
where
    T: Keyed + for<'de> serde::Deserialize<'de>,
{
    snapshot
        .iter()
        .filter_map(|(key, fields)| match parse_record(key, fields) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(key, error = %e, "skipping malformed record");
                None
            }
        })
        .collect()
}

/// A report as shown in the home feed
#[derive(Debug, Clone, PartialEq)]
pub struct ReportCard {
    pub id: String,
    pub title: String,
    pub description: String,
    /// First photo, or [`PLACEHOLDER_IMAGE`]
    pub image: String,
}

impl From<WaterReport> for ReportCard {
    fn from(report: WaterReport) -> Self {
        let image = report
            .images
            .into_iter()
            .next()
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string());
        Self {
            id: report.id,
            title: report.title,
            description: report.description,
            image,
        }
    }
}

pub fn report_cards(snapshot: &Snapshot) -> Vec<ReportCard> {
    parse_collection::<WaterReport>(snapshot)
        .into_iter()
        .map(ReportCard::from)
        .collect()
}

/// Display name derived from the sign-in e-mail
pub fn author_from_email(email: Option<&str>) -> String {
    email
        .and_then(|email| email.split('@').next())
        .filter(|name| !name.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

pub fn comments_path(discussion_id: &str) -> String {
    format!("{DISCUSSION_COLLECTION}/{discussion_id}/comments")
}

/// Add a comment under a discussion. Blank comments are dropped and give
/// `Ok(None)`; otherwise returns the generated comment key.
pub fn post_comment(
    store: &dyn EntryStore,
    discussion_id: &str,
    email: Option<&str>,
    content: &str,
) -> Result<Option<String>, DiscussionError> {
    if email.is_none() {
        return Err(DiscussionError::NotSignedIn);
    }
    if content.trim().is_empty() {
        return Ok(None);
    }

    let comment = Comment {
        id: String::new(),
        author: author_from_email(email),
        content: content.to_string(),
    };
    let fields = serde_json::to_value(&comment).map_err(StoreError::from)?;
    let key = store.push(&comments_path(discussion_id), &fields)?;
    info!(discussion_id, key, "comment posted");
    Ok(Some(key))
}

/// Fields of a thread being started
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDiscussion {
    pub title: String,
    pub category: String,
    pub content: String,
    /// Already uploaded image URI
    pub image: Option<String>,
}

fn check_thread(title: &str, category: &str) -> Result<(), DiscussionError> {
    if title.trim().is_empty() {
        return Err(DiscussionError::MissingTitle);
    }
    if category.trim().is_empty() {
        return Err(DiscussionError::MissingCategory);
    }
    Ok(())
}

/// Start a new thread with zero likes and return its key
pub fn post_discussion(
    store: &dyn EntryStore,
    email: Option<&str>,
    new: NewDiscussion,
) -> Result<String, DiscussionError> {
    if email.is_none() {
        return Err(DiscussionError::NotSignedIn);
    }
    check_thread(&new.title, &new.category)?;

    let fields = json!({
        "title": new.title.trim(),
        "category": new.category,
        "author": author_from_email(email),
        "content": new.content,
        "image": new.image,
        "likes": 0,
    });
    let key = store.push(DISCUSSION_COLLECTION, &fields)?;
    info!(key, "discussion started");
    Ok(key)
}

/// Edited fields of an existing thread
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscussionEdit {
    pub title: String,
    pub category: String,
    pub content: String,
    /// Newly uploaded image. `None` keeps the thread's current one.
    pub image: Option<String>,
}

impl DiscussionEdit {
    /// Edit form prefilled from `discussion`
    pub fn of(discussion: &Discussion) -> Self {
        Self {
            title: discussion.title.clone(),
            category: discussion.category.clone(),
            content: discussion.content.clone(),
            image: None,
        }
    }
}

/// Write the edited fields of thread `id`. Author, likes and comments are
/// left as they are.
pub fn update_discussion(
    store: &dyn EntryStore,
    id: &str,
    edit: DiscussionEdit,
) -> Result<(), DiscussionError> {
    check_thread(&edit.title, &edit.category)?;

    let mut fields = Map::new();
    fields.insert("title".into(), Value::from(edit.title.trim()));
    fields.insert("category".into(), Value::from(edit.category));
    fields.insert("content".into(), Value::from(edit.content));
    if let Some(image) = edit.image {
        fields.insert("image".into(), Value::from(image));
    }

    store
        .update(DISCUSSION_COLLECTION, id, &fields)
        .inspect(|_| info!(id, "discussion updated"))
        .inspect_err(|e| error!(id, error = %e, "discussion update failed"))?;
    Ok(())
}

/// The "start a thread" / "edit thread" form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadDraft {
    /// Key of the thread being edited, `None` for a new one
    pub editing: Option<String>,
    pub title: String,
    pub category: String,
    pub content: String,
    /// Local photo picked by the user, uploaded on submit
    pub photo: Option<PathBuf>,
}

impl ThreadDraft {
    pub fn edit(discussion: &Discussion) -> Self {
        Self {
            editing: Some(discussion.id.clone()),
            title: discussion.title.clone(),
            category: discussion.category.clone(),
            content: discussion.content.clone(),
            photo: None,
        }
    }

    pub fn check(&self) -> Result<(), DiscussionError> {
        check_thread(&self.title, &self.category)
    }

    /// Upload the picked photo, if any, and return its URI
    pub async fn upload_photo(&self, blobs: &dyn BlobStore) -> Result<Option<String>, BlobError> {
        let uris = upload_photos(blobs, self.photo.iter().cloned().collect()).await?;
        Ok(uris.into_iter().next())
    }

    /// Post or update the thread with the already uploaded `image`. Returns
    /// the thread key.
    pub fn save(
        self,
        store: &dyn EntryStore,
        email: Option<&str>,
        image: Option<String>,
    ) -> Result<String, DiscussionError> {
        match self.editing {
            Some(id) => {
                let edit = DiscussionEdit {
                    title: self.title,
                    category: self.category,
                    content: self.content,
                    image,
                };
                update_discussion(store, &id, edit)?;
                Ok(id)
            }
            None => post_discussion(
                store,
                email,
                NewDiscussion {
                    title: self.title,
                    category: self.category,
                    content: self.content,
                    image,
                },
            ),
        }
    }
}

/// Threads in creation order
pub fn discussions(snapshot: &Snapshot) -> Vec<Discussion> {
    parse_collection(snapshot)
}

pub fn comments(snapshot: &Snapshot) -> Vec<Comment> {
    parse_collection(snapshot)
}
