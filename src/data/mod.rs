//! Data layer module
//!
//! The content model and its in-memory plumbing:
//! - Media assets and ordered collections
//! - Reply threads and posts
//! - Aggregate entities with defaults and hydration
//! - Shared aggregate handles and the aggregate cache

mod aggregates;
mod cache;
mod collection;
mod hydrate;
mod lookup;
mod media;
mod models;
mod post;
mod shared;
mod thread;

pub use aggregates::{
    About, AboutPatch, Album, AlbumPatch, CoverImage, Gallery, GalleryPatch, Homepage,
    HomepagePatch, OAuthConfig, OAuthPatch, OAuthProvider, PaymentConfig, PaymentPatch,
    PaymentProvider, Playlist, PlaylistPatch, Track,
};
pub use cache::AggregateCache;
pub use collection::{Ordered, OrderedCollection};
pub use hydrate::{
    ENTITY_NAMES, Hydrate, default_of, hydrate, hydrate_json, hydrate_named, hydrate_with,
};
pub use lookup::{AccountSummary, ArtistSummary, EntityDirectory};
pub use media::{FileRef, MediaAsset, MediaAssetRecord, MediaKind, MediaPayload, MediaSlots, SizeClass};
pub use models::*;
pub use post::{ContentBody, ContentBodyRecord, Post, PostPatch, PostRecord};
pub use shared::SharedAggregate;
pub use thread::{
    FavoriteRecord, FavoriteState, ReplyNode, ReplyRecord, ReplyThread, ReplyView,
};
