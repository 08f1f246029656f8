//! Posts
//!
//! A post is titled text with an ordered list of content bodies and a
//! reply thread. The post's own favorites live on the thread root, so
//! toggling a post and toggling a reply go through the same ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hydrate::{Hydrate, overlay, overlay_id};
use super::media::{FileRef, MediaKind, MediaPayload};
use super::models::{AccountRef, RecordId};
use super::thread::{FavoriteRecord, FavoriteState, ReplyRecord, ReplyThread};
use crate::config::ContentConfig;
use crate::error::{AppError, Result, ValidationErrors};

// =============================================================================
// Content Body
// =============================================================================

/// One block of a post: a media file or text only
///
/// `file` is `None` for a text-only block; otherwise the payload's kind
/// decides which slot pair is populated.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "ContentBodyRecord", into = "ContentBodyRecord")]
pub struct ContentBody {
    pub id: RecordId,
    file: Option<MediaPayload>,
}

impl ContentBody {
    /// Text-only block
    pub fn text() -> Self {
        Self::default()
    }

    pub fn media(payload: MediaPayload) -> Self {
        Self {
            id: RecordId::Unassigned,
            file: Some(payload),
        }
    }

    /// # Errors
    /// `InvalidVariant` if `kind` is `None` while a file is given
    pub fn construct(kind: Option<MediaKind>, file: FileRef, file_compressed: FileRef) -> Result<Self> {
        match kind {
            Some(kind) => Ok(Self::media(MediaPayload::new(kind, file, file_compressed))),
            None if file.is_empty() && file_compressed.is_empty() => Ok(Self::text()),
            None => Err(AppError::InvalidVariant(
                "content body without a kind cannot carry a file".to_string(),
            )
            .recorded()),
        }
    }

    /// `None` for a text-only block
    pub fn kind(&self) -> Option<MediaKind> {
        self.file.as_ref().map(MediaPayload::kind)
    }

    pub fn file(&self) -> Option<&MediaPayload> {
        self.file.as_ref()
    }

    pub fn is_text_only(&self) -> bool {
        self.file.is_none()
    }
}

/// Storage shape of a content body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentBodyRecord {
    pub id: Option<i64>,
    pub kind: Option<MediaKind>,
    pub file: FileRef,
    pub file_compressed: FileRef,
}

impl TryFrom<ContentBodyRecord> for ContentBody {
    type Error = AppError;

    fn try_from(record: ContentBodyRecord) -> Result<Self> {
        let mut body = Self::construct(record.kind, record.file, record.file_compressed)?;
        body.id = record.id.into();
        Ok(body)
    }
}

impl From<ContentBody> for ContentBodyRecord {
    fn from(body: ContentBody) -> Self {
        let (kind, file, file_compressed) = match body.file {
            Some(payload) => {
                let kind = payload.kind();
                let (file, compressed) = match payload {
                    MediaPayload::Image {
                        image,
                        image_compressed,
                    } => (image, image_compressed),
                    MediaPayload::Video {
                        video,
                        video_compressed,
                    } => (video, video_compressed),
                };
                (Some(kind), file, compressed)
            }
            None => (None, FileRef::default(), FileRef::default()),
        };

        Self {
            id: body.id.into(),
            kind,
            file,
            file_compressed,
        }
    }
}

// =============================================================================
// Post
// =============================================================================

/// A post with its content bodies and reply thread
///
/// The thread is a concurrent aggregate of its own behind an `Arc`:
/// clones of a post share it, so reply handles taken from one stay valid
/// on the others. Use `deep_clone` for a post with an independent thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "PostRecord", into = "PostRecord")]
pub struct Post {
    pub id: RecordId,
    pub author: Option<AccountRef>,
    pub title: String,
    pub contents: Vec<ContentBody>,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    thread: Arc<ReplyThread>,
}

impl Post {
    /// New unpersisted post stamped with the current time
    pub fn new(author: AccountRef, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            author: Some(author),
            title: title.into(),
            body: body.into(),
            created_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn thread(&self) -> &ReplyThread {
        &self.thread
    }

    /// Copy of the post whose thread shares no nodes with this one
    pub fn deep_clone(&self) -> Self {
        Self {
            thread: Arc::new(ReplyThread::clone(&self.thread)),
            ..self.clone()
        }
    }

    pub fn add_content(&mut self, content: ContentBody) -> usize {
        self.contents.push(content);
        self.contents.len() - 1
    }

    /// # Errors
    /// `IndexOutOfRange` if `index >= contents.len()`
    pub fn remove_content(&mut self, index: usize) -> Result<ContentBody> {
        if index >= self.contents.len() {
            return Err(AppError::IndexOutOfRange {
                index,
                len: self.contents.len(),
            }
            .recorded());
        }
        Ok(self.contents.remove(index))
    }

    pub fn toggle_favorite(&self, actor: AccountRef) -> Result<FavoriteState> {
        self.thread.toggle_favorite(self.thread.root(), actor)
    }

    pub fn set_favorite(&self, actor: AccountRef, favorited: bool) -> Result<FavoriteState> {
        self.thread.set_favorite(self.thread.root(), actor, favorited)
    }

    /// Whether `viewer` favorites the post
    pub fn is_favorited(&self, viewer: AccountRef) -> bool {
        self.thread.is_favorited(self.thread.root(), viewer)
    }

    pub fn favorite_count(&self) -> u64 {
        self.thread.root().favorite_count()
    }

    /// Storage shape of the post, thread included
    pub fn to_record(&self) -> PostRecord {
        let mut favorited_by = self.thread.favorited_by(self.thread.root().id());
        favorited_by.sort();

        PostRecord {
            id: self.id.into(),
            author: self.author,
            title: self.title.clone(),
            contents: self.contents.iter().cloned().map(Into::into).collect(),
            body: self.body.clone(),
            created_at: self.created_at,
            favorites: FavoriteRecord {
                favorite_count: self.favorite_count(),
                favorited_by,
            },
            replies: self.thread.to_records(),
        }
    }

    /// Rebuild a post from storage
    pub fn from_record(record: PostRecord, content: &ContentConfig) -> std::result::Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let contents = contents_from_records(record.contents, content, &mut errors);
        let thread = match ReplyThread::from_records(record.favorites, record.replies) {
            Ok(thread) => thread,
            Err(nested) => {
                errors.merge(nested);
                ReplyThread::new()
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            id: record.id.into(),
            author: record.author,
            title: record.title,
            contents,
            body: record.body,
            created_at: record.created_at,
            thread: Arc::new(thread),
        })
    }
}

/// Storage shape of a post
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostRecord {
    pub id: Option<i64>,
    pub author: Option<AccountRef>,
    pub title: String,
    pub contents: Vec<ContentBodyRecord>,
    pub body: String,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub favorites: FavoriteRecord,
    pub replies: Vec<ReplyRecord>,
}

impl TryFrom<PostRecord> for Post {
    type Error = AppError;

    fn try_from(record: PostRecord) -> Result<Self> {
        Self::from_record(record, &ContentConfig::default()).map_err(AppError::Validation)
    }
}

impl From<Post> for PostRecord {
    fn from(post: Post) -> Self {
        post.to_record()
    }
}

/// Partial post input
///
/// Supplying any of the favorite or reply fields rebuilds the thread;
/// fields left out keep their current value.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PostPatch {
    pub id: Option<i64>,
    pub author: Option<AccountRef>,
    pub title: Option<String>,
    pub contents: Option<Vec<ContentBodyRecord>>,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub favorite_count: Option<u64>,
    pub favorited_by: Option<Vec<AccountRef>>,
    pub replies: Option<Vec<ReplyRecord>>,
}

impl Hydrate for Post {
    type Patch = PostPatch;
    const ENTITY: &'static str = "post";

    fn overlay(&self, patch: PostPatch, content: &ContentConfig) -> std::result::Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut post = self.clone();

        overlay_id(&mut post.id, patch.id, &mut errors);
        overlay(&mut post.author, patch.author.map(Some));
        overlay(&mut post.title, patch.title);
        overlay(&mut post.body, patch.body);
        overlay(&mut post.created_at, patch.created_at.map(Some));
        if let Some(records) = patch.contents {
            post.contents = contents_from_records(records, content, &mut errors);
        }

        if patch.favorite_count.is_some() || patch.favorited_by.is_some() || patch.replies.is_some() {
            let current = self.to_record();
            let favorites = FavoriteRecord {
                favorite_count: patch
                    .favorite_count
                    .unwrap_or(current.favorites.favorite_count),
                favorited_by: patch
                    .favorited_by
                    .unwrap_or(current.favorites.favorited_by),
            };
            let replies = patch.replies.unwrap_or(current.replies);
            match ReplyThread::from_records(favorites, replies) {
                Ok(thread) => post.thread = Arc::new(thread),
                Err(nested) => errors.merge(nested),
            }
        }

        if errors.is_empty() { Ok(post) } else { Err(errors) }
    }
}

fn contents_from_records(
    records: Vec<ContentBodyRecord>,
    content: &ContentConfig,
    errors: &mut ValidationErrors,
) -> Vec<ContentBody> {
    let mut bodies = Vec::with_capacity(records.len());
    for (i, record) in records.into_iter().enumerate() {
        match ContentBody::try_from(record) {
            Ok(body) if body.is_text_only() && !content.allow_text_only_bodies => {
                errors.push(format!("contents[{i}].kind"), "text-only content is not allowed");
            }
            Ok(body) => bodies.push(body),
            Err(error) => errors.absorb(&format!("contents[{i}]"), error),
        }
    }
    bodies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::hydrate::{default_of, hydrate, hydrate_with};
    use serde_json::json;

    fn patch(value: serde_json::Value) -> PostPatch {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn content_body_without_kind_must_be_text_only() {
        assert!(ContentBody::construct(None, FileRef::default(), FileRef::default())
            .unwrap()
            .is_text_only());

        let error =
            ContentBody::construct(None, FileRef::path("a.jpg"), FileRef::default()).unwrap_err();
        assert!(matches!(error, AppError::InvalidVariant(_)));

        let video =
            ContentBody::construct(Some(MediaKind::Video), FileRef::path("a.mp4"), FileRef::default())
                .unwrap();
        assert_eq!(video.kind(), Some(MediaKind::Video));
    }

    #[test]
    fn content_body_serializes_flat() {
        let body = ContentBody::media(MediaPayload::new(
            MediaKind::Video,
            FileRef::path("clip.mp4"),
            FileRef::path("clip-small.mp4"),
        ));
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["kind"], json!("VIDEO"));
        assert_eq!(value["file"], json!("clip.mp4"));
        assert_eq!(value["fileCompressed"], json!("clip-small.mp4"));

        let text = serde_json::to_value(ContentBody::text()).unwrap();
        assert_eq!(text["kind"], serde_json::Value::Null);
    }

    #[test]
    fn default_post_is_empty() {
        let post: Post = default_of();
        assert!(!post.id.is_assigned());
        assert!(post.contents.is_empty());
        assert_eq!(post.favorite_count(), 0);
        assert_eq!(post.thread().reply_count(), 0);
    }

    #[test]
    fn toggle_twice_restores_count() {
        let post = Post::new(AccountRef(1), "Hello", "");
        let fan = AccountRef(2);

        let first = post.toggle_favorite(fan).unwrap();
        assert!(first.favorited);
        assert_eq!(first.favorite_count, 1);
        assert!(post.is_favorited(fan));

        let second = post.toggle_favorite(fan).unwrap();
        assert!(!second.favorited);
        assert_eq!(post.favorite_count(), 0);
    }

    #[test]
    fn remove_content_out_of_range() {
        let mut post = Post::default();
        post.add_content(ContentBody::text());

        let error = post.remove_content(1).unwrap_err();
        assert!(matches!(error, AppError::IndexOutOfRange { index: 1, len: 1 }));
        assert_eq!(post.contents.len(), 1);
        assert!(post.remove_content(0).unwrap().is_text_only());
    }

    #[test]
    fn strict_content_rejects_text_only_bodies() {
        let input = json!({ "contents": [{ "kind": "IMAGE", "file": "a.jpg" }, {}] });

        let relaxed = hydrate(&Post::default(), patch(input.clone())).unwrap();
        assert_eq!(relaxed.contents.len(), 2);

        let strict = ContentConfig {
            allow_text_only_bodies: false,
        };
        let error = hydrate_with(&Post::default(), patch(input), &strict).unwrap_err();
        assert!(matches!(error, AppError::Validation(errors) if errors.mentions("contents[1].kind")));
    }

    #[test]
    fn record_round_trip_keeps_thread() {
        let post = Post::new(AccountRef(1), "Tour", "dates inside");
        post.toggle_favorite(AccountRef(7)).unwrap();
        let reply = post
            .thread()
            .add_reply(post.thread().root(), AccountRef(2), "see you there")
            .unwrap();
        post.thread().toggle_favorite(&reply, AccountRef(1)).unwrap();

        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["favoriteCount"], json!(1));
        assert_eq!(value["favoritedBy"], json!([7]));

        let back: Post = serde_json::from_value(value).unwrap();
        assert_eq!(back.favorite_count(), 1);
        assert!(back.is_favorited(AccountRef(7)));
        let replies = back.thread().root().replies();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].body(), "see you there");
        assert!(back.thread().is_favorited(&replies[0], AccountRef(1)));
    }

    #[test]
    fn hydrate_replies_failure_leaves_base_untouched() {
        let base = Post::new(AccountRef(1), "Base", "");
        base.toggle_favorite(AccountRef(3)).unwrap();

        let error = hydrate(
            &base,
            patch(json!({
                "title": "Changed",
                "replies": [{ "body": "no author" }]
            })),
        )
        .unwrap_err();

        assert!(matches!(error, AppError::Validation(errors) if errors.mentions("replies[0].author")));
        assert_eq!(base.title, "Base");
        assert_eq!(base.favorite_count(), 1);
    }

    #[test]
    fn clones_share_the_thread() {
        let post = Post::new(AccountRef(1), "Original", "");
        let reply = post
            .thread()
            .add_reply(post.thread().root(), AccountRef(2), "hi")
            .unwrap();

        let mut copy = post.clone();
        copy.title = "Edited".to_string();
        copy.thread().add_reply(&reply, AccountRef(3), "nested").unwrap();

        assert_eq!(post.thread().reply_count(), 2);
        assert_eq!(post.title, "Original");
    }

    #[test]
    fn deep_clone_copies_the_thread() {
        let post = Post::new(AccountRef(1), "Original", "");
        let reply = post
            .thread()
            .add_reply(post.thread().root(), AccountRef(2), "hi")
            .unwrap();
        post.toggle_favorite(AccountRef(2)).unwrap();

        let copy = post.deep_clone();
        assert_eq!(copy.favorite_count(), 1);
        assert!(copy.thread().add_reply(&reply, AccountRef(3), "stale").is_err());

        copy.thread()
            .add_reply(copy.thread().root(), AccountRef(2), "only in copy")
            .unwrap();
        assert_eq!(copy.thread().reply_count(), 2);
        assert_eq!(post.thread().reply_count(), 1);
    }

    #[test]
    fn title_only_hydrate_keeps_reply_handles() {
        let post = Post::new(AccountRef(1), "Original", "");
        let reply = post
            .thread()
            .add_reply(post.thread().root(), AccountRef(2), "hi")
            .unwrap();

        let renamed = hydrate_with(&post, patch(json!({ "title": "Renamed" })), &ContentConfig::default()).unwrap();
        assert_eq!(renamed.title, "Renamed");
        assert!(renamed.thread().add_reply(&reply, AccountRef(3), "still attached").is_ok());

        let rebuilt = hydrate_with(&post, patch(json!({ "favoriteCount": 0 })), &ContentConfig::default()).unwrap();
        assert!(rebuilt.thread().add_reply(&reply, AccountRef(3), "old thread").is_err());
        assert_eq!(rebuilt.thread().reply_count(), 2);
    }
}
