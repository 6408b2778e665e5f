/// Mirror API response types for deserialization.
///
/// These structures mirror the JSON returned by `/api/server`. Responses are
/// untrusted, so the shape is checked on the raw JSON before deserializing.
use super::ProviderError;
use serde::Deserialize;
use serde_json::Value;

/// The response of a single mirror server.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct StreamResponse {
    /// Thumbnail track URL; the playlist lives next to it
    pub thumbnail: String,
    /// Audio renditions (the API calls this list `url`)
    #[serde(rename = "url")]
    pub audio_tracks: Vec<MirrorAudioTrack>,
    /// Subtitle tracks
    pub tracks: Vec<MirrorSubtitleTrack>,
    /// Upstream host label, only used for logging
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

/// An audio rendition as reported by a mirror.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct MirrorAudioTrack {
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Region flag, e.g. "US"
    #[serde(default)]
    pub flag: Option<String>,
}

/// A subtitle track as reported by a mirror.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct MirrorSubtitleTrack {
    #[serde(default)]
    pub url: Option<String>,
    /// Language code, sometimes suffixed with a number ("en2")
    #[serde(default)]
    pub lang: Option<String>,
}

/// Identification of the mirror server that answered.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ServerInfo {
    #[serde(default)]
    pub name: Option<String>,
}

/// Parses and shape-checks a mirror response body.
pub(super) fn parse_stream_response(body: &[u8]) -> Result<StreamResponse, ProviderError> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ProviderError::Parse(e.to_string()))?;

    check_shape(&value)?;

    serde_json::from_value(value).map_err(|e| ProviderError::Shape(e.to_string()))
}

/// Requires an object with a string `thumbnail` and array `url` and `tracks`.
fn check_shape(value: &Value) -> Result<(), ProviderError> {
    let object = value
        .as_object()
        .ok_or_else(|| ProviderError::Shape("response is not an object".to_string()))?;

    if !object.get("thumbnail").is_some_and(Value::is_string) {
        return Err(ProviderError::Shape("thumbnail is not a string".to_string()));
    }

    for field in ["url", "tracks"] {
        if !object.get(field).is_some_and(Value::is_array) {
            return Err(ProviderError::Shape(format!("{} is not an array", field)));
        }
    }

    Ok(())
}
