//! Aggregate entities
//!
//! Flat records of scalar metadata. Gallery and Playlist each own one
//! ordered collection; the others own no nested structure. `Default`
//! is the canonical empty value: unassigned id, empty strings and
//! collections, baseline enum variants.

use serde::{Deserialize, Serialize};

use super::collection::{Ordered, OrderedCollection};
use super::hydrate::{Hydrate, assets_from_records, overlay, overlay_id};
use super::lookup::{ArtistSummary, EntityDirectory};
use super::media::{FileRef, MediaAsset, MediaAssetRecord, MediaPayload, MediaSlots, SizeClass};
use super::models::{ArtistRef, OrderIndex, RecordId};
use crate::config::ContentConfig;
use crate::error::{Result, ValidationErrors};

/// Image pair used as a cover (original + compressed)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverImage {
    pub image: FileRef,
    pub image_compressed: FileRef,
}

impl CoverImage {
    fn overlay(&mut self, image: Option<FileRef>, image_compressed: Option<FileRef>) {
        overlay(&mut self.image, image);
        overlay(&mut self.image_compressed, image_compressed);
    }
}

// =============================================================================
// Album
// =============================================================================

/// Album: metadata plus a cover image pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Album {
    pub id: RecordId,
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    pub cover: CoverImage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlbumPatch {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<FileRef>,
    pub image_compressed: Option<FileRef>,
}

impl Hydrate for Album {
    type Patch = AlbumPatch;
    const ENTITY: &'static str = "album";

    fn overlay(&self, patch: AlbumPatch, _: &ContentConfig) -> std::result::Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut album = self.clone();

        overlay_id(&mut album.id, patch.id, &mut errors);
        overlay(&mut album.title, patch.title);
        overlay(&mut album.description, patch.description);
        album.cover.overlay(patch.image, patch.image_compressed);

        finish(album, errors)
    }
}

// =============================================================================
// Gallery
// =============================================================================

/// Gallery: an ordered collection of media assets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Gallery {
    pub id: RecordId,
    pub title: String,
    pub description: String,
    pub images: OrderedCollection<MediaAsset>,
}

impl Gallery {
    /// Insert an asset (append when `at` is `None`); returns its index.
    pub fn add_image(&mut self, asset: MediaAsset, at: Option<usize>) -> Result<usize> {
        self.images.insert(asset, at)
    }

    pub fn remove_image(&mut self, index: usize) -> Result<MediaAsset> {
        self.images.remove_at(index)
    }

    pub fn reorder_images(&mut self, from: usize, to: usize) -> Result<()> {
        self.images.reorder(from, to)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GalleryPatch {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<MediaAssetRecord>>,
}

impl Hydrate for Gallery {
    type Patch = GalleryPatch;
    const ENTITY: &'static str = "gallery";

    fn overlay(&self, patch: GalleryPatch, _: &ContentConfig) -> std::result::Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut gallery = self.clone();

        overlay_id(&mut gallery.id, patch.id, &mut errors);
        overlay(&mut gallery.title, patch.title);
        overlay(&mut gallery.description, patch.description);
        if let Some(records) = patch.images {
            overlay(
                &mut gallery.images,
                assets_from_records(records, "images", &mut errors),
            );
        }

        finish(gallery, errors)
    }
}

// =============================================================================
// Playlist
// =============================================================================

/// Music track inside a playlist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Track {
    pub id: RecordId,
    pub title: String,
    /// Credited artist (weak reference)
    pub artist: Option<ArtistRef>,
    pub audio: FileRef,
    pub duration_secs: u32,
    order: OrderIndex,
}

impl Track {
    pub fn new(title: impl Into<String>, artist: Option<ArtistRef>, audio: impl Into<FileRef>) -> Self {
        Self {
            title: title.into(),
            artist,
            audio: audio.into(),
            ..Self::default()
        }
    }

    pub fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = duration_secs;
        self
    }
}

impl Ordered for Track {
    const COLLECTION: &'static str = "playlist_tracks";

    fn order_index(&self) -> OrderIndex {
        self.order
    }

    fn set_order_index(&mut self, index: OrderIndex) {
        self.order = index;
    }
}

/// Playlist: an ordered collection of tracks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Playlist {
    pub id: RecordId,
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    pub cover: CoverImage,
    pub tracks: OrderedCollection<Track>,
}

impl Playlist {
    pub fn add_track(&mut self, track: Track, at: Option<usize>) -> Result<usize> {
        self.tracks.insert(track, at)
    }

    pub fn remove_track(&mut self, index: usize) -> Result<Track> {
        self.tracks.remove_at(index)
    }

    pub fn reorder_tracks(&mut self, from: usize, to: usize) -> Result<()> {
        self.tracks.reorder(from, to)
    }

    /// Total running time in seconds
    pub fn duration_secs(&self) -> u64 {
        self.tracks.iter().map(|t| u64::from(t.duration_secs)).sum()
    }

    /// Artist credit per track position, for tracks whose artist resolves
    pub fn credits(&self, directory: &dyn EntityDirectory) -> Vec<(usize, ArtistSummary)> {
        self.tracks
            .iter()
            .enumerate()
            .filter_map(|(position, track)| {
                track
                    .artist
                    .and_then(|artist| directory.artist(artist))
                    .map(|summary| (position, summary))
            })
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaylistPatch {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<FileRef>,
    pub image_compressed: Option<FileRef>,
    pub tracks: Option<Vec<Track>>,
}

impl Hydrate for Playlist {
    type Patch = PlaylistPatch;
    const ENTITY: &'static str = "playlist";

    fn overlay(&self, patch: PlaylistPatch, _: &ContentConfig) -> std::result::Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut playlist = self.clone();

        overlay_id(&mut playlist.id, patch.id, &mut errors);
        overlay(&mut playlist.title, patch.title);
        overlay(&mut playlist.description, patch.description);
        playlist.cover.overlay(patch.image, patch.image_compressed);
        if let Some(tracks) = patch.tracks {
            for (i, track) in tracks.iter().enumerate() {
                if track.title.trim().is_empty() {
                    errors.push(format!("tracks[{i}].title"), "must not be empty");
                }
            }
            playlist.tracks = OrderedCollection::from_items(tracks);
        }

        finish(playlist, errors)
    }
}

// =============================================================================
// Homepage / About
// =============================================================================

/// Homepage hero section
///
/// Defaults to an empty IMAGE hero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Homepage {
    pub id: RecordId,
    pub title: String,
    pub subtitle: String,
    #[serde(flatten)]
    pub hero: MediaPayload,
    pub size: SizeClass,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HomepagePatch {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub size: Option<SizeClass>,
    /// Replaces the whole hero when any slot or the kind is given
    #[serde(flatten)]
    pub hero: MediaSlots,
}

impl Hydrate for Homepage {
    type Patch = HomepagePatch;
    const ENTITY: &'static str = "homepage";

    fn overlay(&self, patch: HomepagePatch, _: &ContentConfig) -> std::result::Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut homepage = self.clone();

        overlay_id(&mut homepage.id, patch.id, &mut errors);
        overlay(&mut homepage.title, patch.title);
        overlay(&mut homepage.subtitle, patch.subtitle);
        overlay(&mut homepage.size, patch.size);
        if patch.hero != MediaSlots::default() {
            match patch.hero.into_payload() {
                Ok(hero) => homepage.hero = hero,
                Err(error) => errors.absorb("hero", error),
            }
        }

        finish(homepage, errors)
    }
}

/// About page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct About {
    pub id: RecordId,
    pub title: String,
    pub body: String,
    #[serde(flatten)]
    pub cover: CoverImage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AboutPatch {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub image: Option<FileRef>,
    pub image_compressed: Option<FileRef>,
}

impl Hydrate for About {
    type Patch = AboutPatch;
    const ENTITY: &'static str = "about";

    fn overlay(&self, patch: AboutPatch, _: &ContentConfig) -> std::result::Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut about = self.clone();

        overlay_id(&mut about.id, patch.id, &mut errors);
        overlay(&mut about.title, patch.title);
        overlay(&mut about.body, patch.body);
        about.cover.overlay(patch.image, patch.image_compressed);

        finish(about, errors)
    }
}

// =============================================================================
// Payment / OAuth configuration
// =============================================================================

/// Payment provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentProvider {
    #[default]
    Stripe,
    Paypal,
}

/// Payment provider credentials and subscription price
///
/// Provider calls happen elsewhere; this is only the stored shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentConfig {
    pub id: RecordId,
    pub provider: PaymentProvider,
    pub public_key: String,
    pub secret_key: String,
    pub webhook_secret: String,
    /// ISO 4217 code, empty until configured
    pub currency: String,
    /// Subscription price in minor units
    pub price_cents: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PaymentPatch {
    pub id: Option<i64>,
    pub provider: Option<PaymentProvider>,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub currency: Option<String>,
    pub price_cents: Option<i64>,
}

impl Hydrate for PaymentConfig {
    type Patch = PaymentPatch;
    const ENTITY: &'static str = "payment";

    fn overlay(&self, patch: PaymentPatch, _: &ContentConfig) -> std::result::Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut payment = self.clone();

        overlay_id(&mut payment.id, patch.id, &mut errors);
        overlay(&mut payment.provider, patch.provider);
        overlay(&mut payment.public_key, patch.public_key);
        overlay(&mut payment.secret_key, patch.secret_key);
        overlay(&mut payment.webhook_secret, patch.webhook_secret);
        overlay(&mut payment.currency, patch.currency.map(|c| c.trim().to_ascii_uppercase()));
        overlay(&mut payment.price_cents, patch.price_cents);

        if payment.price_cents < 0 {
            errors.push("priceCents", "must not be negative");
        }
        if !payment.currency.is_empty()
            && (payment.currency.len() != 3 || !payment.currency.chars().all(|c| c.is_ascii_alphabetic()))
        {
            errors.push("currency", "must be a 3-letter ISO 4217 code");
        }

        finish(payment, errors)
    }
}

/// OAuth provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OAuthProvider {
    #[default]
    Google,
    Github,
    Facebook,
}

/// OAuth client registration for one provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OAuthConfig {
    pub id: RecordId,
    pub provider: OAuthProvider,
    pub enabled: bool,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OAuthPatch {
    pub id: Option<i64>,
    pub provider: Option<OAuthProvider>,
    pub enabled: Option<bool>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub scopes: Option<Vec<String>>,
}

impl Hydrate for OAuthConfig {
    type Patch = OAuthPatch;
    const ENTITY: &'static str = "oauth";

    fn overlay(&self, patch: OAuthPatch, _: &ContentConfig) -> std::result::Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut oauth = self.clone();

        overlay_id(&mut oauth.id, patch.id, &mut errors);
        overlay(&mut oauth.provider, patch.provider);
        overlay(&mut oauth.enabled, patch.enabled);
        overlay(&mut oauth.client_id, patch.client_id);
        overlay(&mut oauth.client_secret, patch.client_secret);
        overlay(&mut oauth.redirect_uri, patch.redirect_uri);
        overlay(&mut oauth.scopes, patch.scopes);

        if !oauth.redirect_uri.is_empty()
            && !(oauth.redirect_uri.starts_with("https://") || oauth.redirect_uri.starts_with("http://"))
        {
            errors.push("redirectUri", "must be an http(s) URL");
        }
        if oauth.enabled && oauth.client_id.is_empty() {
            errors.push("clientId", "is required when the provider is enabled");
        }

        finish(oauth, errors)
    }
}

fn finish<T>(value: T, errors: ValidationErrors) -> std::result::Result<T, ValidationErrors> {
    if errors.is_empty() { Ok(value) } else { Err(errors) }
}
