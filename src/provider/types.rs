//! Result types returned by providers.
//!
//! These serialize to the camelCase JSON shape hosts expect.
use serde::{Deserialize, Serialize};

/// Transport of a playable source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Hls,
}

/// An audio rendition offered by a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Language code
    pub language: String,
    /// Display label, e.g. "English (US)"
    pub label: String,
    /// Whether players should pick this track by default
    pub default: bool,
}

/// Which provider and mirror a source came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceProvider {
    pub id: String,
    pub name: String,
}

/// A playable stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Proxied stream URL
    pub url: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub quality: String,
    pub audio_tracks: Vec<AudioTrack>,
    pub provider: SourceProvider,
}

/// Subtitle file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Vtt,
}

/// A subtitle track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// Proxied subtitle URL
    pub url: String,
    pub label: String,
    pub format: SubtitleFormat,
}

/// Machine readable diagnostic category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    ProviderError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A non-fatal record of why a result is partial or empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub message: String,
    /// Input field the diagnostic refers to, empty when it concerns the whole request
    pub field: String,
    pub severity: Severity,
}

impl Diagnostic {
    /// A provider-wide error
    pub fn provider_error(message: impl Into<String>) -> Self {
        Self {
            code: DiagnosticCode::ProviderError,
            message: message.into(),
            field: String::new(),
            severity: Severity::Error,
        }
    }
}

/// Everything a provider found for one request
///
/// `sources` and `subtitles` never contain two entries with the same URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub sources: Vec<Source>,
    pub subtitles: Vec<SubtitleTrack>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AggregationResult {
    /// An empty result carrying a single diagnostic
    pub fn failed(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.subtitles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_serializes_to_host_shape() {
        let source = Source {
            url: "http://proxy/v1/proxy?data=x".to_string(),
            kind: SourceKind::Hls,
            quality: "up to HD".to_string(),
            audio_tracks: vec![AudioTrack {
                language: "en".to_string(),
                label: "English (US)".to_string(),
                default: true,
            }],
            provider: SourceProvider {
                id: "vidzee".to_string(),
                name: "VidZee (Alpha)".to_string(),
            },
        };

        assert_eq!(
            serde_json::to_value(&source).unwrap(),
            json!({
                "url": "http://proxy/v1/proxy?data=x",
                "type": "hls",
                "quality": "up to HD",
                "audioTracks": [{"language": "en", "label": "English (US)", "default": true}],
                "provider": {"id": "vidzee", "name": "VidZee (Alpha)"}
            })
        );
    }

    #[test]
    fn test_failed_result_serializes_diagnostic() {
        let result = AggregationResult::failed(Diagnostic::provider_error("VidZee: boom"));

        assert!(result.is_empty());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "sources": [],
                "subtitles": [],
                "diagnostics": [{
                    "code": "PROVIDER_ERROR",
                    "message": "VidZee: boom",
                    "field": "",
                    "severity": "error"
                }]
            })
        );
    }
}
