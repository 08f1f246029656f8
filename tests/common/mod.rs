//! Common test utilities for E2E tests

#![allow(dead_code)]

use fanfolio::data::{
    AccountRef, AccountSummary, ArtistRef, ArtistSummary, EntityDirectory, Gallery, MediaAsset,
};

mockall::mock! {
    pub Directory {}

    impl EntityDirectory for Directory {
        fn account(&self, account: AccountRef) -> Option<AccountSummary>;
        fn artist(&self, artist: ArtistRef) -> Option<ArtistSummary>;
    }
}

/// Directory that knows accounts 1..=`known` as "user-N"
pub fn directory_with_accounts(known: i64) -> MockDirectory {
    let mut directory = MockDirectory::new();
    directory.expect_account().returning(move |account| {
        (1..=known).contains(&account.0).then(|| AccountSummary {
            account,
            display_name: format!("user-{}", account.0),
        })
    });
    directory.expect_artist().returning(|_| None);
    directory
}

/// Image asset identified by its description
pub fn asset(name: &str) -> MediaAsset {
    MediaAsset::image(format!("{name}.jpg").as_str(), format!("{name}-small.jpg").as_str())
        .with_description(name)
}

/// Gallery holding `names` appended in order
pub fn gallery_with(names: &[&str]) -> Gallery {
    let mut gallery = Gallery::default();
    for name in names {
        gallery.add_image(asset(name), None).unwrap();
    }
    gallery
}

/// Descriptions in collection order
pub fn names(gallery: &Gallery) -> Vec<String> {
    gallery
        .images
        .iter()
        .map(|asset| asset.description.clone())
        .collect()
}

/// Order indices in collection order
pub fn order_indices(gallery: &Gallery) -> Vec<Option<usize>> {
    gallery
        .images
        .iter()
        .map(|asset| asset.order_index().get().copied())
        .collect()
}

/// Deterministic pseudo-random sequence for operation fuzzing
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_below(&mut self, bound: usize) -> usize {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.0 >> 33) as usize) % bound.max(1)
    }
}
