//! Song catalog: style label → playable audio URLs
//!
//! The catalog is read-only at serve time. It is produced out-of-band by
//! `bmq-gen` and read through one of the [`CatalogSource`] variants.

mod scan;
mod source;
mod style;

pub use scan::{scan_audio_dir, ScanReport, AUDIO_EXTENSIONS};
pub use source::CatalogSource;
pub use style::StyleLabel;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One playable song
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SongRef {
    pub style: StyleLabel,
    pub url: String,
}

/// Mapping from style label to its ordered list of song URLs
///
/// Serializes as a plain JSON object, the same shape as `music-files.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    styles: BTreeMap<StyleLabel, Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty-but-well-formed catalog: every style present with no songs
    pub fn fallback<S: AsRef<str>>(styles: &[S]) -> Self {
        let styles = styles
            .iter()
            .map(|s| (StyleLabel::new(s.as_ref()), Vec::new()))
            .collect();
        Self { styles }
    }

    /// Append `url` to `style`, creating the style if needed
    pub fn push(&mut self, style: impl Into<StyleLabel>, url: impl Into<String>) {
        self.styles.entry(style.into()).or_default().push(url.into());
    }

    /// Replace the song list for a style
    pub fn insert(&mut self, style: impl Into<StyleLabel>, urls: Vec<String>) {
        self.styles.insert(style.into(), urls);
    }

    pub fn styles(&self) -> impl Iterator<Item = (&StyleLabel, &[String])> {
        self.styles.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn style_count(&self) -> usize {
        self.styles.len()
    }

    pub fn song_count(&self) -> usize {
        self.styles.values().map(Vec::len).sum()
    }

    /// True when there is nothing to play, even if style keys exist
    pub fn is_empty(&self) -> bool {
        self.song_count() == 0
    }

    /// All (style, url) pairs in catalog order
    pub fn flatten(&self) -> Vec<SongRef> {
        self.styles
            .iter()
            .flat_map(|(style, urls)| {
                urls.iter().map(move |url| SongRef {
                    style: style.clone(),
                    url: url.clone(),
                })
            })
            .collect()
    }

    /// Uniform pick over all songs; `None` for an empty catalog
    pub fn random_song<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<SongRef> {
        self.flatten().choose(rng).cloned()
    }
}

impl<S: Into<StyleLabel>> FromIterator<(S, Vec<String>)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (S, Vec<String>)>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for (style, urls) in iter {
            catalog.insert(style, urls);
        }
        catalog
    }
}
