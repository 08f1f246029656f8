//! E2E tests for defaults, hydration and the aggregate cache

mod common;

use std::time::Duration;

use common::{gallery_with, names};
use fanfolio::config::ContentConfig;
use fanfolio::data::{
    AggregateCache, Album, Gallery, Homepage, MediaAsset, MediaAssetRecord, MediaKind, Playlist,
    Post, SizeClass, Slot, default_of, hydrate_json, hydrate_named,
};
use fanfolio::error::AppError;
use serde_json::json;

#[test]
fn test_defaults_are_canonical_and_independent() {
    let mut first: Gallery = default_of();
    let second: Gallery = default_of();
    first.add_image(MediaAsset::image("a.jpg", ""), None).unwrap();

    assert!(second.images.is_empty());
    assert!(default_of::<Playlist>().tracks.is_empty());
    assert_eq!(default_of::<Album>().title, "");

    let homepage: Homepage = default_of();
    assert_eq!(homepage.hero.kind(), MediaKind::Image);
    assert_eq!(homepage.size, SizeClass::Square);

    let asset: MediaAsset = default_of();
    assert!(!asset.id.is_assigned());
    assert!(asset.payload().is_empty());
}

#[test]
fn test_hydrate_single_image_gets_first_index() {
    let gallery = hydrate_json(
        &default_of::<Gallery>(),
        json!({ "images": [{ "kind": "IMAGE", "image": "a.jpg", "description": "A" }] }),
        &ContentConfig::default(),
    )
    .unwrap();

    assert_eq!(gallery.images.len(), 1);
    assert_eq!(gallery.images.get(0).unwrap().order_index(), Slot::Assigned(0));
    assert_eq!(names(&gallery), ["A"]);
}

#[test]
fn test_video_with_image_slot_is_invalid_variant() {
    let record: MediaAssetRecord = serde_json::from_value(json!({
        "kind": "VIDEO",
        "image": "poster.jpg",
        "video": "",
        "videoCompressed": ""
    }))
    .unwrap();
    let error = MediaAsset::try_from(record).unwrap_err();
    assert!(matches!(error, AppError::InvalidVariant(_)));

    let error = hydrate_json(
        &default_of::<Gallery>(),
        json!({ "images": [{ "kind": "VIDEO", "image": "poster.jpg" }] }),
        &ContentConfig::default(),
    )
    .unwrap_err();
    match error {
        AppError::Validation(errors) => {
            let entry = errors.iter().next().unwrap();
            assert_eq!(entry.field, "images[0]");
            assert!(entry.reason.starts_with("Invalid variant"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_failed_hydrate_leaves_base_untouched() {
    let base = gallery_with(&["A", "B"]);
    let before = base.clone();

    let result = hydrate_json(
        &base,
        json!({
            "id": 1,
            "title": "Replaced",
            "images": [{ "kind": "IMAGE", "image": "ok.jpg" }, { "image": "no-kind.jpg" }]
        }),
        &ContentConfig::default(),
    );

    assert!(result.is_err());
    assert_eq!(base, before);
}

#[test]
fn test_errors_are_collected_per_field() {
    let error = hydrate_named(
        "post",
        json!({
            "contents": [{ "file": "stray.jpg" }],
            "replies": [{ "body": "anonymous" }]
        }),
        &ContentConfig::default(),
    )
    .unwrap_err();

    match error {
        AppError::Validation(errors) => {
            assert!(errors.mentions("contents[0]"));
            assert!(errors.mentions("replies[0].author"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_named_post_hydration_round_trips() {
    let value = hydrate_named(
        "post",
        json!({
            "id": 10,
            "author": 1,
            "title": "Studio diary",
            "contents": [{ "kind": "VIDEO", "file": "day1.mp4" }, {}],
            "favoriteCount": 3,
            "favoritedBy": [5],
            "replies": [{ "author": 2, "body": "more please", "replies": [{ "author": 1, "body": "soon" }] }]
        }),
        &ContentConfig::default(),
    )
    .unwrap();

    let post: Post = serde_json::from_value(value).unwrap();
    assert_eq!(post.id, Slot::Assigned(10));
    assert_eq!(post.contents[0].kind(), Some(MediaKind::Video));
    assert!(post.contents[1].is_text_only());
    assert_eq!(post.favorite_count(), 3);

    // Favorites stored without an actor stay counted.
    post.toggle_favorite(fanfolio::data::AccountRef(5)).unwrap();
    assert_eq!(post.favorite_count(), 2);
    assert_eq!(post.thread().reply_count(), 2);
}

#[test]
fn test_identifier_cannot_be_reassigned() {
    let content = ContentConfig::default();
    let album = hydrate_json(&default_of::<Album>(), json!({ "id": 4 }), &content).unwrap();
    assert!(hydrate_json(&album, json!({ "id": 4, "title": "Same" }), &content).is_ok());

    let error = hydrate_json(&album, json!({ "id": 5 }), &content).unwrap_err();
    assert!(matches!(error, AppError::Validation(errors) if errors.mentions("id")));
}

#[test]
fn test_cache_miss_falls_back_to_default() {
    let cache: AggregateCache<Gallery> = AggregateCache::new("e2e_galleries", 8, Duration::from_secs(60));
    assert!(cache.get_or_default(1).images.is_empty());

    cache.insert(1, gallery_with(&["A"]));
    assert_eq!(names(&cache.get_or_default(1)), ["A"]);
}
