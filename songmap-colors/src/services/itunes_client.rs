//! iTunes top-songs RSS client
//!
//! Fetches the ranked chart for one storefront:
//! `GET {base}/{country}/rss/topsongs/limit={n}/json`
//!
//! The feed is loosely shaped (a lone entry is an object instead of a
//! one-element array, same for `link`), so the payload is decoded into an
//! explicit schema and every missing required field becomes a typed
//! [`FetchError`].

use crate::types::Song;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Public iTunes endpoint
pub const ITUNES_BASE_URL: &str = "https://itunes.apple.com";

/// Titles fetched per country
pub const DEFAULT_SONG_LIMIT: usize = 10;

const USER_AGENT: &str = concat!("songmap/", env!("CARGO_PKG_VERSION"));
const PREVIEW_LINK_TYPE: &str = "audio/x-m4a";
const ARTWORK_INDEX: usize = 2;

/// Song fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Feed returned HTTP {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Feed missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid country code: {0:?}")]
    InvalidCountryCode(String),
}

/// Supplier of ranked songs for a country
///
/// Implementations fail closed: a missing rank is an error or an empty list,
/// never a padded placeholder.
#[async_trait]
pub trait SongSource: Send + Sync {
    /// Up to `limit` songs, best ranked first
    async fn fetch_top_songs(&self, iso_code: &str, limit: usize) -> Result<Vec<Song>, FetchError>;

    /// Up to `limit` titles, best ranked first
    async fn fetch_top_titles(&self, iso_code: &str, limit: usize) -> Result<Vec<String>, FetchError> {
        let songs = self.fetch_top_songs(iso_code, limit).await?;
        Ok(songs.into_iter().take(limit).map(|song| song.title).collect())
    }
}

/// Either a single value or an array of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    feed: Option<Feed>,
}

#[derive(Debug, Deserialize)]
struct Feed {
    entry: Option<OneOrMany<FeedEntry>>,
}

#[derive(Debug, Deserialize)]
struct FeedEntry {
    #[serde(rename = "im:name")]
    name: Option<Label>,
    #[serde(rename = "im:artist")]
    artist: Option<Label>,
    #[serde(rename = "im:image", default)]
    images: Vec<Label>,
    link: Option<OneOrMany<Link>>,
}

#[derive(Debug, Deserialize)]
struct Label {
    label: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    attributes: LinkAttributes,
}

#[derive(Debug, Deserialize)]
struct LinkAttributes {
    #[serde(rename = "type")]
    link_type: Option<String>,
    href: Option<String>,
}

impl FeedEntry {
    fn into_song(self) -> Result<Song, FetchError> {
        let title = self
            .name
            .map(|n| n.label)
            .ok_or(FetchError::MissingField("im:name"))?;

        let artwork = self
            .images
            .get(ARTWORK_INDEX)
            .or_else(|| self.images.last())
            .map(|image| image.label.clone())
            .unwrap_or_default();

        let preview_url = self
            .link
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .find(|link| link.attributes.link_type.as_deref() == Some(PREVIEW_LINK_TYPE))
            .and_then(|link| link.attributes.href);

        Ok(Song {
            title,
            artist: self
                .artist
                .map(|a| a.label)
                .unwrap_or_else(|| "Unknown Artist".to_string()),
            artwork,
            preview_url,
        })
    }
}

/// Decode a top-songs feed body
///
/// A feed without `entry` is a storefront with no chart and yields an empty
/// list; a body without `feed` is malformed.
pub fn parse_feed(body: &str) -> Result<Vec<Song>, FetchError> {
    let response: FeedResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let feed = response.feed.ok_or(FetchError::MissingField("feed"))?;

    let Some(entries) = feed.entry else {
        return Ok(Vec::new());
    };

    entries
        .into_vec()
        .into_iter()
        .map(FeedEntry::into_song)
        .collect()
}

/// Accept exactly two ASCII letters
pub fn is_valid_country_code(code: &str) -> bool {
    code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic())
}

/// HTTP client for the iTunes RSS feed
#[derive(Debug, Clone)]
pub struct ItunesClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ItunesClient {
    /// Build a client; `timeout` bounds each whole request
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn feed_url(&self, iso_code: &str, limit: usize) -> String {
        format!(
            "{}/{}/rss/topsongs/limit={}/json",
            self.base_url,
            iso_code.to_lowercase(),
            limit
        )
    }
}

#[async_trait]
impl SongSource for ItunesClient {
    async fn fetch_top_songs(&self, iso_code: &str, limit: usize) -> Result<Vec<Song>, FetchError> {
        if !is_valid_country_code(iso_code) {
            return Err(FetchError::InvalidCountryCode(iso_code.to_string()));
        }

        let url = self.feed_url(iso_code, limit);
        tracing::debug!(iso_code = %iso_code, url = %url, "Querying top songs feed");

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let mut songs = parse_feed(&body)?;
        songs.truncate(limit);

        tracing::debug!(iso_code = %iso_code, songs = songs.len(), "Retrieved top songs");
        Ok(songs)
    }
}
