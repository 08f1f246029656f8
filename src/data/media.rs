//! Media assets
//!
//! An asset is either an image or a video. The kind decides which pair
//! of payload slots is meaningful, so the payload is a sum type: an image
//! asset simply has no video slots. Storage and network payloads still
//! use the flat shape (`image`, `imageCompressed`, `video`,
//! `videoCompressed`); converting from it is where `InvalidVariant`
//! is detected.

use serde::{Deserialize, Serialize};

use super::collection::Ordered;
use super::models::{OrderIndex, RecordId};
use crate::error::{AppError, Result};

/// Kind tag of an asset or content body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Video => "VIDEO",
        }
    }
}

/// Size classification used for layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SizeClass {
    #[default]
    Square,
    Portrait,
    Landscape,
    Wide,
}

/// Reference to file content
///
/// Either a path/URL into external storage or raw bytes that have not
/// been uploaded yet. The model never inspects the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileRef {
    Path(String),
    Bytes(Vec<u8>),
}

impl FileRef {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    /// True for an empty path or an empty byte buffer
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Path(path) => path.is_empty(),
            Self::Bytes(bytes) => bytes.is_empty(),
        }
    }
}

impl Default for FileRef {
    fn default() -> Self {
        Self::Path(String::new())
    }
}

impl From<&str> for FileRef {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

/// Kind-tagged payload: only the active slot pair exists
///
/// Serialized in the flat slot layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MediaSlots", into = "MediaSlots")]
pub enum MediaPayload {
    Image {
        image: FileRef,
        image_compressed: FileRef,
    },
    Video {
        video: FileRef,
        video_compressed: FileRef,
    },
}

impl MediaPayload {
    /// Payload of `kind` with the given primary/compressed references.
    pub fn new(kind: MediaKind, primary: FileRef, compressed: FileRef) -> Self {
        match kind {
            MediaKind::Image => Self::Image {
                image: primary,
                image_compressed: compressed,
            },
            MediaKind::Video => Self::Video {
                video: primary,
                video_compressed: compressed,
            },
        }
    }

    /// Empty payload of `kind`
    pub fn blank(kind: MediaKind) -> Self {
        Self::new(kind, FileRef::default(), FileRef::default())
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image { .. } => MediaKind::Image,
            Self::Video { .. } => MediaKind::Video,
        }
    }

    pub fn primary(&self) -> &FileRef {
        match self {
            Self::Image { image, .. } => image,
            Self::Video { video, .. } => video,
        }
    }

    pub fn compressed(&self) -> &FileRef {
        match self {
            Self::Image {
                image_compressed, ..
            } => image_compressed,
            Self::Video {
                video_compressed, ..
            } => video_compressed,
        }
    }

    /// Nothing uploaded yet
    pub fn is_empty(&self) -> bool {
        self.primary().is_empty() && self.compressed().is_empty()
    }
}

impl Default for MediaPayload {
    fn default() -> Self {
        Self::blank(MediaKind::Image)
    }
}

/// Flat slot layout used by storage and network payloads
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaSlots {
    pub kind: Option<MediaKind>,
    pub image: FileRef,
    pub image_compressed: FileRef,
    pub video: FileRef,
    pub video_compressed: FileRef,
}

impl MediaSlots {
    /// Resolve the flat layout into a kind-tagged payload.
    ///
    /// # Errors
    /// `InvalidVariant` when payload is present without a kind, or when
    /// the slots of the other kind are populated.
    pub fn into_payload(self) -> Result<MediaPayload> {
        let image_used = !self.image.is_empty() || !self.image_compressed.is_empty();
        let video_used = !self.video.is_empty() || !self.video_compressed.is_empty();

        match self.kind {
            None if image_used || video_used => Err(AppError::InvalidVariant(
                "kind must be set before payload is attached".to_string(),
            )),
            None => Ok(MediaPayload::default()),
            Some(MediaKind::Image) if video_used => Err(AppError::InvalidVariant(
                "IMAGE asset carries payload in its video slots".to_string(),
            )),
            Some(MediaKind::Video) if image_used => Err(AppError::InvalidVariant(
                "VIDEO asset carries payload in its image slots".to_string(),
            )),
            Some(kind @ MediaKind::Image) => Ok(MediaPayload::new(
                kind,
                self.image,
                self.image_compressed,
            )),
            Some(kind @ MediaKind::Video) => Ok(MediaPayload::new(
                kind,
                self.video,
                self.video_compressed,
            )),
        }
    }
}

impl TryFrom<MediaSlots> for MediaPayload {
    type Error = AppError;

    fn try_from(slots: MediaSlots) -> Result<Self> {
        slots.into_payload()
    }
}

impl From<MediaPayload> for MediaSlots {
    fn from(payload: MediaPayload) -> Self {
        match payload {
            MediaPayload::Image {
                image,
                image_compressed,
            } => Self {
                kind: Some(MediaKind::Image),
                image,
                image_compressed,
                ..Self::default()
            },
            MediaPayload::Video {
                video,
                video_compressed,
            } => Self {
                kind: Some(MediaKind::Video),
                video,
                video_compressed,
                ..Self::default()
            },
        }
    }
}

// =============================================================================
// Media Asset
// =============================================================================

/// A single image or video with an optional compressed rendition
///
/// Actual files live in external storage; this record only holds
/// references and layout metadata. The kind cannot be changed in place:
/// build a new asset instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "MediaAssetRecord", into = "MediaAssetRecord")]
pub struct MediaAsset {
    pub id: RecordId,
    payload: MediaPayload,
    pub size: SizeClass,
    order: OrderIndex,
    pub description: String,
}

impl MediaAsset {
    /// Construct an unpersisted asset
    ///
    /// # Arguments
    /// * `kind` - Declared kind; `None` is only accepted for a blank asset
    /// * `primary` - Original file reference
    /// * `compressed` - Compressed rendition reference
    ///
    /// # Errors
    /// `InvalidVariant` if `kind` is `None` while either reference is
    /// non-empty.
    pub fn construct(
        kind: Option<MediaKind>,
        primary: FileRef,
        compressed: FileRef,
        size: SizeClass,
        description: impl Into<String>,
    ) -> Result<Self> {
        let payload = match kind {
            Some(kind) => MediaPayload::new(kind, primary, compressed),
            None if primary.is_empty() && compressed.is_empty() => MediaPayload::default(),
            None => {
                return Err(AppError::InvalidVariant(
                    "kind must be set before payload is attached".to_string(),
                )
                .recorded());
            }
        };

        Ok(Self {
            id: RecordId::Unassigned,
            payload,
            size,
            order: OrderIndex::Unassigned,
            description: description.into(),
        })
    }

    /// Image asset shortcut
    pub fn image(image: impl Into<FileRef>, image_compressed: impl Into<FileRef>) -> Self {
        Self::from_payload(MediaPayload::new(
            MediaKind::Image,
            image.into(),
            image_compressed.into(),
        ))
    }

    /// Video asset shortcut
    pub fn video(video: impl Into<FileRef>, video_compressed: impl Into<FileRef>) -> Self {
        Self::from_payload(MediaPayload::new(
            MediaKind::Video,
            video.into(),
            video_compressed.into(),
        ))
    }

    pub fn from_payload(payload: MediaPayload) -> Self {
        Self {
            payload,
            ..Self::default()
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.payload.kind()
    }

    pub fn payload(&self) -> &MediaPayload {
        &self.payload
    }

    pub fn order_index(&self) -> OrderIndex {
        self.order
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_size(mut self, size: SizeClass) -> Self {
        self.size = size;
        self
    }
}

impl Ordered for MediaAsset {
    const COLLECTION: &'static str = "media_assets";

    fn order_index(&self) -> OrderIndex {
        self.order
    }

    fn set_order_index(&mut self, index: OrderIndex) {
        self.order = index;
    }
}

/// Flat storage shape of a media asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaAssetRecord {
    pub id: Option<i64>,
    #[serde(flatten)]
    pub slots: MediaSlots,
    pub size: SizeClass,
    pub order: Option<usize>,
    pub description: String,
}

impl TryFrom<MediaAssetRecord> for MediaAsset {
    type Error = AppError;

    fn try_from(record: MediaAssetRecord) -> Result<Self> {
        let payload = record.slots.into_payload()?;
        Ok(Self {
            id: record.id.into(),
            payload,
            size: record.size,
            order: record.order.into(),
            description: record.description,
        })
    }
}

impl From<MediaAsset> for MediaAssetRecord {
    fn from(asset: MediaAsset) -> Self {
        Self {
            id: asset.id.into(),
            slots: asset.payload.into(),
            size: asset.size,
            order: asset.order.into(),
            description: asset.description,
        }
    }
}
