//! SourceScout - Collect playable stream sources from unreliable mirrors
//!
//! This library asks every mirror server of an upstream player for a title
//! at the same time, keeps whatever answers arrive in a usable shape, and
//! merges them into one deduplicated list of proxied sources and subtitles.
//! It also ships the decoder for the encrypted envelopes some mirror fields
//! are wrapped in.

mod config;
mod envelope;
mod provider;
mod proxy;

pub use config::{
    ConfigError, DEFAULT_BASE_URL, DEFAULT_PROXY_BASE_URL, DEFAULT_SERVER_COUNT, ScoutConfig,
};
pub use envelope::{EnvelopeDecoder, decode};
pub use provider::{
    AggregationResult, AudioTrack, ContentType, Diagnostic, DiagnosticCode, MediaKind,
    MediaObject, Provider, ProviderCapabilities, ProviderError, Severity, Source, SourceKind,
    SourceProvider, SubtitleFormat, SubtitleTrack, VidZeeProvider,
};
pub use proxy::{OutboundHeaders, ProxyRequest, ProxyUrlBuilder, QueryProxy};

/// Collects sources for a title using the given configuration
///
/// Builds a [`VidZeeProvider`] and runs a single aggregation. Only an
/// invalid configuration is reported as an error; everything that goes
/// wrong while talking to mirrors ends up as a [`Diagnostic`] in the result.
///
/// # Examples
///
/// ```no_run
/// use source_scout::{MediaKind, MediaObject, ScoutConfig, scout_sources};
///
/// # async fn run() -> Result<(), source_scout::ProviderError> {
/// let result = scout_sources(
///     ScoutConfig::default(),
///     &MediaObject::episode("1399", 1, 1),
///     MediaKind::Tv,
/// )
/// .await?;
///
/// for source in &result.sources {
///     println!("{} via {}", source.url, source.provider.name);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn scout_sources(
    config: ScoutConfig,
    media: &MediaObject,
    kind: MediaKind,
) -> Result<AggregationResult, ProviderError> {
    let provider = VidZeeProvider::new(config)?;
    Ok(provider.aggregate(media, kind).await)
}
