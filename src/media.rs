//! Media records, quiz items and the selectable collection.
//!
//! Raw [`MediaRecord`]s come from an AniList-shaped JSON dump (or the
//! built-in example set when loading fails). The filter chain reduces them
//! to a [`MediaCollection`] of immutable [`MediaItem`]s, which is what the
//! engine draws from each round.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::matching::normalize;

/// Raised when a round is started against an empty collection. This is a
/// domain error: its message is shown to players verbatim.
#[derive(Debug, thiserror::Error)]
#[error("No media available under the current filters")]
pub struct SelectionError;

/// Title variants as delivered by the upstream API. Any slot may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaTitle {
    pub native: Option<String>,
    pub romaji: Option<String>,
    pub english: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverImage {
    #[serde(rename = "extraLarge")]
    pub extra_large: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTag {
    pub name: String,
}

/// One raw entry from the media data file. Only the cover image and one of
/// the title slots are mandatory for play; the remaining attributes exist
/// for filtering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    #[serde(default)]
    pub title: MediaTitle,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub hashtag: Option<String>,
    #[serde(default)]
    pub cover_image: Option<CoverImage>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub favourites: Option<i64>,
    #[serde(default)]
    pub season_year: Option<i64>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub tags: Vec<MediaTag>,
    #[serde(default)]
    pub is_adult: Option<bool>,
}

/// One quiz entry: display string, accepted answers and the poster URL.
/// Immutable once constructed.
#[derive(Debug, Clone)]
pub struct MediaItem {
    /// Human-readable answer, built from the title slots. Independent of
    /// matching.
    pub display: String,
    /// Every string that counts as a correct guess. Duplicates are harmless
    /// since matching is existential.
    pub aliases: Vec<String>,
    /// Poster location: an http(s) URL or a local file path.
    pub image_url: String,
}

impl MediaItem {
    /// Build an item from a raw record. Returns `None` when the record has
    /// no cover image or would end up with no accepted answers.
    pub fn from_record(record: &MediaRecord) -> Option<Self> {
        let image_url = record.cover_image.as_ref()?.extra_large.clone();

        let hashtags = record
            .hashtag
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(str::to_string);

        let aliases: Vec<String> = [
            record.title.english.clone(),
            record.title.romaji.clone(),
            record.title.native.clone(),
        ]
        .into_iter()
        .flatten()
        .chain(record.synonyms.iter().cloned())
        .chain(hashtags)
        .filter(|a| !a.is_empty())
        .collect();

        if aliases.is_empty() {
            tracing::warn!(?record.title, "media record has no usable answers, skipping");
            return None;
        }

        // Empty slots stay as empty segments so the separator count is
        // stable for the frontend.
        let display = [
            record.title.romaji.as_deref().unwrap_or(""),
            record.title.english.as_deref().unwrap_or(""),
            record.title.native.as_deref().unwrap_or(""),
        ]
        .join(" | ");

        Some(Self {
            display,
            aliases,
            image_url,
        })
    }
}

/// The admissible set of quiz items. Rebuilt wholesale whenever the filter
/// chain changes, never partially mutated.
#[derive(Debug, Default)]
pub struct MediaCollection {
    items: Vec<MediaItem>,
}

impl MediaCollection {
    pub fn from_records(records: &[MediaRecord]) -> Self {
        let items: Vec<MediaItem> = records.iter().filter_map(MediaItem::from_record).collect();
        tracing::info!(
            records = records.len(),
            items = items.len(),
            "built media collection"
        );
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Uniformly random member. Fails on an empty collection; the engine
    /// turns that into a Message-phase round abort, not a crash.
    pub fn random(&self) -> Result<&MediaItem, SelectionError> {
        if self.items.is_empty() {
            return Err(SelectionError);
        }
        let index = rand::rng().random_range(0..self.items.len());
        Ok(&self.items[index])
    }

    /// Autocomplete corpus: all aliases, deduplicated by normalized form
    /// while keeping one original spelling per form.
    pub fn completions(&self) -> Vec<String> {
        let mut by_normalized: HashMap<String, String> = HashMap::new();
        for item in &self.items {
            for alias in &item.aliases {
                by_normalized
                    .entry(normalize(alias))
                    .or_insert_with(|| alias.clone());
            }
        }
        by_normalized.into_values().collect()
    }
}

/// Load media records from disk, falling back to the example dataset when
/// the path is absent or unreadable. Load failure is non-fatal by design.
pub async fn load_records(path: Option<&str>) -> Vec<MediaRecord> {
    let Some(path) = path else {
        tracing::info!("no media data path given, using example data");
        return example_records();
    };

    match tokio::fs::read_to_string(path).await {
        Ok(raw) => match serde_json::from_str::<Vec<MediaRecord>>(&raw) {
            Ok(records) => {
                tracing::info!(path, count = records.len(), "loaded media data");
                records
            }
            Err(e) => {
                tracing::error!(path, error = %e, "could not parse media data, using example data");
                example_records()
            }
        },
        Err(e) => {
            tracing::error!(path, error = %e, "could not load media data, using example data");
            example_records()
        }
    }
}

/// Built-in fallback dataset, a handful of well-known entries so the game
/// stays playable without a data file.
pub fn example_records() -> Vec<MediaRecord> {
    vec![
        MediaRecord {
            title: MediaTitle {
                native: Some("鋼の錬金術師".to_string()),
                romaji: Some("Hagane no Renkinjutsushi".to_string()),
                english: Some("Fullmetal Alchemist".to_string()),
            },
            synonyms: vec![
                "Full Metal Alchemist".to_string(),
                "FMA".to_string(),
                "Stalowy alchemik".to_string(),
            ],
            cover_image: Some(CoverImage {
                extra_large:
                    "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/bx121-JUlbsyhTUNkk.png"
                        .to_string(),
            }),
            popularity: Some(197_705),
            favourites: Some(5028),
            season_year: Some(2003),
            genres: vec![
                "Action".to_string(),
                "Adventure".to_string(),
                "Drama".to_string(),
                "Fantasy".to_string(),
            ],
            is_adult: Some(false),
            ..Default::default()
        },
        MediaRecord {
            title: MediaTitle {
                native: Some("ああっ女神さまっ".to_string()),
                romaji: Some("Aa! Megami-sama!".to_string()),
                english: Some("Oh! My Goddess".to_string()),
            },
            synonyms: vec!["Ah! My Goddess (OVA)".to_string(), "Oh, mia dea!".to_string()],
            cover_image: Some(CoverImage {
                extra_large:
                    "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/bx49-jv1G7rSP4lxg.png"
                        .to_string(),
            }),
            popularity: Some(8686),
            favourites: Some(94),
            season_year: Some(1993),
            genres: vec![
                "Comedy".to_string(),
                "Drama".to_string(),
                "Romance".to_string(),
                "Supernatural".to_string(),
            ],
            is_adult: Some(false),
            ..Default::default()
        },
        MediaRecord {
            title: MediaTitle {
                native: Some("ノーゲーム・ノーライフ".to_string()),
                romaji: Some("No Game No Life".to_string()),
                english: Some("No Game, No Life".to_string()),
            },
            synonyms: vec!["NGNL".to_string()],
            hashtag: Some("#nogenora".to_string()),
            cover_image: Some(CoverImage {
                extra_large:
                    "https://s4.anilist.co/file/anilistcdn/media/anime/cover/large/nx19815-bIo51RMWWhLv.jpg"
                        .to_string(),
            }),
            popularity: Some(421_767),
            favourites: Some(14_413),
            season_year: Some(2014),
            genres: vec![
                "Adventure".to_string(),
                "Comedy".to_string(),
                "Fantasy".to_string(),
            ],
            is_adult: Some(false),
            ..Default::default()
        },
    ]
}
