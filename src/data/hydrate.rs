//! Defaults and hydration
//!
//! `default_of` hands out a fresh, structurally valid, empty aggregate.
//! `hydrate` is the single entry point for externally sourced data: it
//! overlays a partial input onto a base value and re-runs the variant and
//! ordering checks on every nested asset and collection. The base value
//! is never modified, so a rejected input leaves the caller's aggregate
//! exactly as it was.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::aggregates::{About, Album, Gallery, Homepage, OAuthConfig, PaymentConfig, Playlist};
use super::collection::OrderedCollection;
use super::media::{MediaAsset, MediaAssetRecord};
use super::models::RecordId;
use super::post::Post;
use crate::config::ContentConfig;
use crate::error::{AppError, Result, ValidationErrors};
use crate::metrics::HYDRATIONS_TOTAL;

/// Aggregate that can be rebuilt from a partial input
pub trait Hydrate: Sized + Default {
    /// Partial input; every field optional
    type Patch: DeserializeOwned;

    /// Entity name used in logs and by the CLI
    const ENTITY: &'static str;

    /// Overlay `patch` onto a copy of `self`, collecting every field error.
    fn overlay(
        &self,
        patch: Self::Patch,
        content: &ContentConfig,
    ) -> std::result::Result<Self, ValidationErrors>;
}

/// Canonical empty value of `T`
///
/// A new value on every call; no instance is shared between callers.
pub fn default_of<T: Default>() -> T {
    T::default()
}

/// Overlay `patch` onto `base` with default content rules
pub fn hydrate<T: Hydrate>(base: &T, patch: T::Patch) -> Result<T> {
    hydrate_with(base, patch, &ContentConfig::default())
}

/// Overlay `patch` onto `base`
///
/// # Errors
/// `Validation` with one entry per rejected field
pub fn hydrate_with<T: Hydrate>(base: &T, patch: T::Patch, content: &ContentConfig) -> Result<T> {
    match base.overlay(patch, content) {
        Ok(hydrated) => {
            HYDRATIONS_TOTAL.inc();
            tracing::debug!(entity = T::ENTITY, "Hydrated aggregate");
            Ok(hydrated)
        }
        Err(errors) => {
            tracing::warn!(
                entity = T::ENTITY,
                error_count = errors.len(),
                errors = %errors,
                "Rejected input"
            );
            Err(AppError::Validation(errors).recorded())
        }
    }
}

/// Overlay a JSON payload onto `base`
///
/// A payload whose shape does not match the patch type is reported as a
/// single field error on the entity.
pub fn hydrate_json<T: Hydrate>(
    base: &T,
    value: serde_json::Value,
    content: &ContentConfig,
) -> Result<T> {
    let patch: T::Patch = serde_json::from_value(value)
        .map_err(|e| AppError::field(T::ENTITY, e.to_string()).recorded())?;
    hydrate_with(base, patch, content)
}

/// Names accepted by `hydrate_named`
pub const ENTITY_NAMES: &[&str] = &[
    Album::ENTITY,
    Gallery::ENTITY,
    Playlist::ENTITY,
    Post::ENTITY,
    Homepage::ENTITY,
    About::ENTITY,
    PaymentConfig::ENTITY,
    OAuthConfig::ENTITY,
];

/// Hydrate the default of the entity called `entity` and return it as JSON
///
/// # Errors
/// `Validation` for an unknown entity name or rejected input
pub fn hydrate_named(
    entity: &str,
    value: serde_json::Value,
    content: &ContentConfig,
) -> Result<serde_json::Value> {
    fn run<T: Hydrate + Serialize>(
        value: serde_json::Value,
        content: &ContentConfig,
    ) -> Result<serde_json::Value> {
        let hydrated = hydrate_json(&default_of::<T>(), value, content)?;
        serde_json::to_value(&hydrated).map_err(|e| AppError::Internal(e.into()))
    }

    match entity {
        "album" => run::<Album>(value, content),
        "gallery" => run::<Gallery>(value, content),
        "playlist" => run::<Playlist>(value, content),
        "post" => run::<Post>(value, content),
        "homepage" => run::<Homepage>(value, content),
        "about" => run::<About>(value, content),
        "payment" => run::<PaymentConfig>(value, content),
        "oauth" => run::<OAuthConfig>(value, content),
        other => Err(AppError::field(
            "entity",
            format!("unknown entity '{other}', expected one of {}", ENTITY_NAMES.join(", ")),
        )
        .recorded()),
    }
}

// =============================================================================
// Overlay helpers
// =============================================================================

/// Take the incoming identifier unless it would reassign an existing one.
pub(crate) fn overlay_id(target: &mut RecordId, incoming: Option<i64>, errors: &mut ValidationErrors) {
    let Some(incoming) = incoming else {
        return;
    };
    match *target {
        RecordId::Assigned(current) if current != incoming => {
            errors.push("id", format!("cannot reassign {current} to {incoming}"));
        }
        RecordId::Assigned(_) => {}
        RecordId::Unassigned => *target = RecordId::Assigned(incoming),
    }
}

pub(crate) fn overlay<T>(target: &mut T, incoming: Option<T>) {
    if let Some(value) = incoming {
        *target = value;
    }
}

/// Convert flat asset records, reporting each bad record under `field[i]`.
pub(crate) fn assets_from_records(
    records: Vec<MediaAssetRecord>,
    field: &str,
    errors: &mut ValidationErrors,
) -> Option<OrderedCollection<MediaAsset>> {
    let mut assets = Vec::with_capacity(records.len());
    let mut failed = false;
    for (i, record) in records.into_iter().enumerate() {
        match MediaAsset::try_from(record) {
            Ok(asset) => assets.push(asset),
            Err(error) => {
                errors.absorb(&format!("{field}[{i}]"), error);
                failed = true;
            }
        }
    }
    (!failed).then(|| OrderedCollection::from_items(assets))
}
