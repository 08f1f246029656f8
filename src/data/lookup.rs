//! Lookup capability for weak references
//!
//! Aggregates only store `AccountRef` / `ArtistRef`. Whoever needs the
//! referenced entity resolves it through an `EntityDirectory` supplied
//! by the storage layer.

use serde::{Deserialize, Serialize};

use super::models::{AccountRef, ArtistRef};

/// Minimal account data needed to render an author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub account: AccountRef,
    pub display_name: String,
}

/// Minimal artist data needed to credit a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSummary {
    pub artist: ArtistRef,
    pub name: String,
}

/// Resolves weak references to summaries
#[cfg_attr(test, mockall::automock)]
pub trait EntityDirectory: Send + Sync {
    fn account(&self, account: AccountRef) -> Option<AccountSummary>;

    fn artist(&self, artist: ArtistRef) -> Option<ArtistSummary>;
}
