//! Media filter chain and its tiny configuration language.
//!
//! Filters restrict which records may be selected for a round. They are
//! configured as a string of the form `"popularity(1000,);genres(\"Action\")"`
//! where the argument list is parsed as a JSON array. A `valid_media` filter
//! is always applied first so the collection invariant (cover image plus at
//! least one title) holds regardless of user configuration.

use serde_json::Value;

use crate::matching::array_almost_has;
use crate::media::MediaRecord;

/// A filter string that failed to parse or referenced an unknown filter.
/// Reported to the configuring caller, never broadcast to players.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("unknown filter: {0}")]
    UnknownFilter(String),
    #[error("malformed filter expression: {0}")]
    Malformed(String),
    #[error("bad arguments for {name}: {source}")]
    BadArgs {
        name: String,
        source: serde_json::Error,
    },
}

/// One parsed `name(args)` entry.
#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub name: String,
    pub args: Vec<Value>,
}

/// A validated, pure predicate chain over media records.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    specs: Vec<FilterSpec>,
}

const KNOWN_FILTERS: &[&str] = &[
    "popularity",
    "favourites",
    "year",
    "sfw",
    "nsfw",
    "genres",
    "tags",
];

impl FilterChain {
    /// Parse a `"name(a,b);name2(c)"` filter string.
    pub fn parse(filter_string: &str) -> Result<Self, FilterError> {
        let mut specs = Vec::new();
        for part in filter_string.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, rest) = part
                .split_once('(')
                .ok_or_else(|| FilterError::Malformed(part.to_string()))?;
            let args_str = rest
                .strip_suffix(')')
                .ok_or_else(|| FilterError::Malformed(part.to_string()))?;
            let name = name.trim().to_string();
            if !KNOWN_FILTERS.contains(&name.as_str()) {
                return Err(FilterError::UnknownFilter(name));
            }
            let args: Vec<Value> =
                serde_json::from_str(&args_json(args_str)).map_err(|source| {
                    FilterError::BadArgs {
                        name: name.clone(),
                        source,
                    }
                })?;
            specs.push(FilterSpec { name, args });
        }
        Ok(Self { specs })
    }

    /// Apply the chain, keeping records every enabled filter accepts.
    pub fn apply(&self, records: &[MediaRecord]) -> Vec<MediaRecord> {
        records
            .iter()
            .filter(|r| is_valid_media(r) && self.specs.iter().all(|spec| accepts(spec, r)))
            .cloned()
            .collect()
    }
}

/// Build the JSON array for an argument list. An absent range bound is
/// written as an empty segment (`popularity(1000,)`), which is not valid
/// JSON, so empty top-level segments become `null` before parsing.
fn args_json(args_str: &str) -> String {
    let args_str = args_str.trim();
    if args_str.is_empty() {
        return "[]".to_string();
    }
    let parts: Vec<&str> = split_top_level(args_str)
        .into_iter()
        .map(|part| {
            let part = part.trim();
            if part.is_empty() {
                "null"
            } else {
                part
            }
        })
        .collect();
    format!("[{}]", parts.join(","))
}

/// Split on commas outside of double-quoted strings.
fn split_top_level(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in args.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ',' if !in_string => {
                parts.push(&args[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[start..]);
    parts
}

/// Mandatory sanity filter: a playable record needs a cover image and at
/// least an english or romaji title.
fn is_valid_media(record: &MediaRecord) -> bool {
    if record.cover_image.is_none() {
        tracing::trace!(?record.title, "dropping record without cover image");
        return false;
    }
    if record.title.english.is_none() && record.title.romaji.is_none() {
        tracing::trace!(?record.title, "dropping record without usable title");
        return false;
    }
    true
}

fn accepts(spec: &FilterSpec, record: &MediaRecord) -> bool {
    match spec.name.as_str() {
        "popularity" => in_between(record.popularity, &spec.args),
        "favourites" => in_between(record.favourites, &spec.args),
        "year" => in_between(record.season_year, &spec.args),
        "sfw" => !record.is_adult.unwrap_or(false),
        "nsfw" => record.is_adult.unwrap_or(false),
        "genres" => any_string_arg_matches(&spec.args, &record.genres),
        "tags" => {
            let names: Vec<&str> = record.tags.iter().map(|t| t.name.as_str()).collect();
            any_string_arg_matches(&spec.args, &names)
        }
        // Unknown names are rejected at parse time.
        _ => true,
    }
}

/// Inclusive range check; a missing bound is open-ended, a missing value
/// never matches a bounded range.
fn in_between(value: Option<i64>, args: &[Value]) -> bool {
    let min = args.first().and_then(Value::as_i64);
    let max = args.get(1).and_then(Value::as_i64);
    let Some(v) = value else {
        return min.is_none() && max.is_none();
    };
    min.is_none_or(|m| m <= v) && max.is_none_or(|m| v <= m)
}

fn any_string_arg_matches<S: AsRef<str>>(args: &[Value], haystack: &[S]) -> bool {
    args.iter()
        .filter_map(Value::as_str)
        .any(|wanted| array_almost_has(haystack, wanted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{CoverImage, MediaTag, MediaTitle};

    fn record(popularity: i64, year: i64, genres: &[&str]) -> MediaRecord {
        MediaRecord {
            title: MediaTitle {
                romaji: Some("Some Show".to_string()),
                ..Default::default()
            },
            cover_image: Some(CoverImage {
                extra_large: "poster.png".to_string(),
            }),
            popularity: Some(popularity),
            season_year: Some(year),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_a_chain_of_filters() {
        let chain = FilterChain::parse("popularity(1000,50000); genres(\"Action\",\"Drama\")")
            .expect("valid filter string");
        assert_eq!(chain.specs.len(), 2);
        assert_eq!(chain.specs[0].name, "popularity");
        assert_eq!(chain.specs[1].args.len(), 2);
    }

    #[test]
    fn open_range_bounds_parse_as_empty_segments() {
        let chain = FilterChain::parse("popularity(1000,)").expect("trailing comma");
        assert_eq!(chain.specs[0].args, vec![Value::from(1000), Value::Null]);

        let chain = FilterChain::parse("popularity(,100)").expect("leading comma");
        assert_eq!(chain.specs[0].args, vec![Value::Null, Value::from(100)]);
    }

    #[test]
    fn commas_inside_quoted_args_are_not_separators() {
        let chain = FilterChain::parse(r#"genres("Slice of Life, sort of","Drama")"#).unwrap();
        assert_eq!(chain.specs[0].args.len(), 2);
        assert_eq!(
            chain.specs[0].args[0],
            Value::from("Slice of Life, sort of")
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_filters() {
        assert!(matches!(
            FilterChain::parse("bogus(1)"),
            Err(FilterError::UnknownFilter(_))
        ));
        assert!(matches!(
            FilterChain::parse("popularity"),
            Err(FilterError::Malformed(_))
        ));
        assert!(matches!(
            FilterChain::parse("popularity(not json)"),
            Err(FilterError::BadArgs { .. })
        ));
    }

    #[test]
    fn empty_string_is_the_empty_chain() {
        let chain = FilterChain::parse("").unwrap();
        let records = vec![record(10, 2000, &[])];
        assert_eq!(chain.apply(&records).len(), 1);
    }

    #[test]
    fn popularity_range_is_inclusive_and_open_ended() {
        let records = vec![record(100, 2000, &[]), record(5000, 2000, &[])];

        let chain = FilterChain::parse("popularity(1000,)").unwrap();
        assert_eq!(chain.apply(&records).len(), 1);

        let chain = FilterChain::parse("popularity(,100)").unwrap();
        assert_eq!(chain.apply(&records).len(), 1);

        let chain = FilterChain::parse("popularity(100,5000)").unwrap();
        assert_eq!(chain.apply(&records).len(), 2);
    }

    #[test]
    fn genre_matching_is_fuzzy() {
        let records = vec![record(1, 2000, &["Sci-Fi"]), record(1, 2000, &["Drama"])];
        let chain = FilterChain::parse("genres(\"scifi\")").unwrap();
        assert_eq!(chain.apply(&records).len(), 1);
    }

    #[test]
    fn sfw_and_nsfw_follow_their_names() {
        let mut adult = record(1, 2000, &[]);
        adult.is_adult = Some(true);
        let clean = record(1, 2000, &[]);

        let chain = FilterChain::parse("sfw()").unwrap();
        let kept = chain.apply(&[adult.clone(), clean.clone()]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].is_adult, None);

        let chain = FilterChain::parse("nsfw()").unwrap();
        let kept = chain.apply(&[adult, clean]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].is_adult, Some(true));
    }

    #[test]
    fn tag_names_are_matched() {
        let mut r = record(1, 2000, &[]);
        r.tags = vec![MediaTag {
            name: "Isekai".to_string(),
        }];
        let chain = FilterChain::parse("tags(\"isekai\")").unwrap();
        assert_eq!(chain.apply(&[r]).len(), 1);
    }

    #[test]
    fn invalid_media_is_always_dropped() {
        let mut no_cover = record(1, 2000, &[]);
        no_cover.cover_image = None;
        let mut no_title = record(1, 2000, &[]);
        no_title.title = MediaTitle {
            native: Some("タイトル".to_string()),
            ..Default::default()
        };

        let chain = FilterChain::parse("").unwrap();
        assert!(chain.apply(&[no_cover, no_title]).is_empty());
    }
}
