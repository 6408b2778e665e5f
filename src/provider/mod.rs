//! Stream source providers
//!
//! This module defines the result types handed back to callers (sources,
//! subtitles and diagnostics), the capability contract a provider implements,
//! and the concrete mirror aggregator.
mod types;
mod vidzee;
mod vidzee_types;

pub use types::{
    AggregationResult, AudioTrack, Diagnostic, DiagnosticCode, Severity, Source, SourceKind,
    SourceProvider, SubtitleFormat, SubtitleTrack,
};
pub use vidzee::VidZeeProvider;

use crate::config::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while collecting sources
///
/// None of these escape a [`Provider`] call: probe-level errors exclude a
/// single mirror from the merge, everything else becomes a [`Diagnostic`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request could not be sent or timed out
    #[error("Request failed: {0}")]
    Network(String),

    /// The mirror answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// The response body was not JSON
    #[error("Failed to parse server response: {0}")]
    Parse(String),

    /// The response was JSON but not a stream response
    #[error("Unexpected response shape: {0}")]
    Shape(String),

    /// The response body exceeded the size limit
    #[error("Response too large ({size} bytes)")]
    ResponseTooLarge { size: u64 },

    /// A probe task panicked or was aborted
    #[error("Probe task failed: {0}")]
    Task(String),

    /// The request itself was malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An outbound header could not be encoded
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// The configuration was rejected
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Kind of media being looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Movie => f.write_str("movie"),
            MediaKind::Tv => f.write_str("tv"),
        }
    }
}

/// Content types a provider can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movies,
    Tv,
}

/// What a provider advertises to its host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCapabilities {
    pub supported_content_types: Vec<ContentType>,
}

/// The title a provider is asked about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaObject {
    /// TMDB identifier of the movie or show
    pub tmdb_id: String,
    /// Season number, for episodes
    #[serde(rename = "s")]
    pub season: Option<u32>,
    /// Episode number within the season
    #[serde(rename = "e")]
    pub episode: Option<u32>,
}

impl MediaObject {
    /// A movie lookup
    pub fn movie(tmdb_id: impl Into<String>) -> Self {
        Self {
            tmdb_id: tmdb_id.into(),
            season: None,
            episode: None,
        }
    }

    /// An episode lookup
    pub fn episode(tmdb_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            tmdb_id: tmdb_id.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    /// Season and episode, if both are present and positive
    pub fn episode_selector(&self) -> Option<(u32, u32)> {
        match (self.season, self.episode) {
            (Some(season), Some(episode)) if season > 0 && episode > 0 => Some((season, episode)),
            _ => None,
        }
    }
}

/// Capability contract for stream source providers
///
/// Implementors never fail: every error is folded into the returned
/// [`AggregationResult`] as a [`Diagnostic`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable machine identifier
    fn id(&self) -> &'static str;

    /// Human readable name
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> ProviderCapabilities;

    /// Collects sources for a movie
    async fn get_movie_sources(&self, media: &MediaObject) -> AggregationResult;

    /// Collects sources for a single TV episode
    ///
    /// `media` must carry a positive season and episode.
    async fn get_tv_sources(&self, media: &MediaObject) -> AggregationResult;

    /// Reports whether the upstream origin is reachable
    async fn health_check(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_selector() {
        assert_eq!(MediaObject::episode("1", 2, 3).episode_selector(), Some((2, 3)));
        assert_eq!(MediaObject::movie("1").episode_selector(), None);
        assert_eq!(MediaObject::episode("1", 0, 3).episode_selector(), None);
        assert_eq!(MediaObject::episode("1", 2, 0).episode_selector(), None);

        let partial = MediaObject {
            tmdb_id: "1".to_string(),
            season: Some(1),
            episode: None,
        };
        assert_eq!(partial.episode_selector(), None);
    }

    #[test]
    fn test_media_object_wire_names() {
        let media: MediaObject =
            serde_json::from_str(r#"{"tmdbId":"1399","s":1,"e":2}"#).unwrap();
        assert_eq!(media, MediaObject::episode("1399", 1, 2));
    }

    #[test]
    fn test_media_kind_display() {
        assert_eq!(MediaKind::Movie.to_string(), "movie");
        assert_eq!(MediaKind::Tv.to_string(), "tv");
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::Http {
            status: 502,
            url: "https://mirror.example/api/server".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502 from https://mirror.example/api/server");

        let err = ProviderError::Shape("thumbnail is not a string".to_string());
        assert_eq!(err.to_string(), "Unexpected response shape: thumbnail is not a string");
    }
}
