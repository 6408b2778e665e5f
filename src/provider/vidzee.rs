//! VidZee mirror aggregator.
//!
//! Every request fans out to all mirror servers at once, waits for each of
//! them to settle, and merges whatever came back into one deduplicated
//! result. Individual mirrors are unreliable, so a failing mirror is only
//! ever logged and skipped.
use super::vidzee_types::{StreamResponse, parse_stream_response};
use super::{
    AggregationResult, AudioTrack, ContentType, Diagnostic, MediaKind, MediaObject, Provider,
    ProviderCapabilities, ProviderError, Source, SourceKind, SourceProvider, SubtitleFormat,
    SubtitleTrack,
};
use crate::config::{ScoutConfig, parse_http_url};
use crate::envelope::EnvelopeDecoder;
use crate::proxy::{OutboundHeaders, ProxyUrlBuilder, QueryProxy};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use ulid::Ulid;
use url::Url;

/// Largest mirror response body accepted (2 MB)
const MAX_RESPONSE_SIZE: u64 = 2 * 1024 * 1024;

/// Suffix of the thumbnail track URL that sits next to the playlist
const THUMBNAIL_SUFFIX: &str = "/thumbnail/thumbnail.vtt";

/// Playlist file replacing [`THUMBNAIL_SUFFIX`]
const PLAYLIST_SUFFIX: &str = "/index.m3u8";

/// Quality label reported for every source; mirrors only serve adaptive playlists
const QUALITY_LABEL: &str = "up to HD";

/// One outbound request to a single mirror server.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProbeTarget {
    /// Mirror server index
    server: usize,
    title_id: String,
    /// Season and episode, for TV lookups
    episode: Option<(u32, u32)>,
}

impl ProbeTarget {
    /// Builds `<origin>/api/server?id=..&sr=..[&ss=..&ep=..]`
    fn request_url(&self, origin: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/api/server", origin))
            .map_err(|e| ProviderError::InvalidInput(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("id", &self.title_id);
            query.append_pair("sr", &self.server.to_string());
            if let Some((season, episode)) = self.episode {
                query.append_pair("ss", &season.to_string());
                query.append_pair("ep", &episode.to_string());
            }
        }

        Ok(url)
    }
}

/// Aggregates sources from the VidZee mirror servers
pub struct VidZeeProvider {
    config: ScoutConfig,
    client: Client,
    proxy: Arc<dyn ProxyUrlBuilder>,
    decoder: EnvelopeDecoder,
    headers: OutboundHeaders,
}

impl VidZeeProvider {
    pub const ID: &'static str = "vidzee";
    pub const NAME: &'static str = "VidZee";

    /// Creates a provider that rewrites URLs through the configured proxy origin
    pub fn new(config: ScoutConfig) -> Result<Self, ProviderError> {
        let proxy = QueryProxy::new(&config.proxy_url()?);
        Self::with_proxy(config, Arc::new(proxy))
    }

    /// Creates a provider with a custom proxy URL builder
    pub fn with_proxy(
        config: ScoutConfig,
        proxy: Arc<dyn ProxyUrlBuilder>,
    ) -> Result<Self, ProviderError> {
        config.validate()?;

        let headers = config.outbound_headers();
        let client = Client::builder()
            .default_headers(header_map(&headers)?)
            .build()
            .map_err(|e| ProviderError::ClientBuild(e.to_string()))?;

        Ok(Self {
            config,
            client,
            proxy,
            decoder: EnvelopeDecoder::default(),
            headers,
        })
    }

    /// Replaces the decoder used for enveloped thumbnail references
    pub fn with_decoder(mut self, decoder: EnvelopeDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    /// Collects sources for a title, waiting for every mirror to settle
    pub async fn aggregate(&self, media: &MediaObject, kind: MediaKind) -> AggregationResult {
        self.aggregate_with_cancel(media, kind, CancellationToken::new())
            .await
    }

    /// Like [`aggregate`](Self::aggregate), but stops waiting once `cancel` fires
    ///
    /// Mirrors that settled before cancellation are still merged; the rest
    /// are aborted and skipped.
    pub async fn aggregate_with_cancel(
        &self,
        media: &MediaObject,
        kind: MediaKind,
        cancel: CancellationToken,
    ) -> AggregationResult {
        let span = info_span!(
            "aggregate",
            request_id = %Ulid::new(),
            title_id = %media.tmdb_id,
            %kind
        );

        async {
            let episode = match kind {
                MediaKind::Movie => None,
                MediaKind::Tv => match media.episode_selector() {
                    Some(selector) => Some(selector),
                    None => return self.empty_result("Missing season/episode data"),
                },
            };

            match self.collect(media, kind, episode, &cancel).await {
                Ok(result) => result,
                Err(e) => {
                    error!(error = %e, "VidZee scrape failed completely");
                    self.empty_result(&e.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn collect(
        &self,
        media: &MediaObject,
        kind: MediaKind,
        episode: Option<(u32, u32)>,
        cancel: &CancellationToken,
    ) -> Result<AggregationResult, ProviderError> {
        let title_id = media.tmdb_id.trim();
        if title_id.is_empty() {
            return Err(ProviderError::InvalidInput("missing title id".to_string()));
        }

        let targets: Vec<ProbeTarget> = (0..self.config.server_count)
            .map(|server| ProbeTarget {
                server,
                title_id: title_id.to_string(),
                episode,
            })
            .collect();

        let settled = self.probe_all(targets, cancel).await?;

        let mut responses = Vec::new();
        for (server, outcome) in settled {
            match outcome {
                Some(Ok(response)) => {
                    debug!(
                        server,
                        provider = ?response.provider,
                        audio_tracks = response.audio_tracks.len(),
                        subtitle_tracks = response.tracks.len(),
                        "Server succeeded"
                    );
                    responses.push((server, response));
                }
                Some(Err(e)) => debug!(server, error = %e, "Server failed"),
                None => debug!(server, "Server abandoned after cancellation"),
            }
        }

        if responses.is_empty() {
            return Ok(self.empty_result(&format!("No working {} servers found", kind)));
        }

        let result = self.merge(&responses);

        info!(
            outcome = "success",
            sources = result.sources.len(),
            subtitles = result.subtitles.len(),
            "Collected {} unique sources, {} unique subtitles",
            result.sources.len(),
            result.subtitles.len()
        );

        Ok(result)
    }

    /// Spawns one task per target and waits for all of them, in target order
    ///
    /// Probe tasks are aborted when this future is dropped before they settle.
    async fn probe_all(
        &self,
        targets: Vec<ProbeTarget>,
        cancel: &CancellationToken,
    ) -> Result<Vec<(usize, Option<Result<StreamResponse, ProviderError>>)>, ProviderError> {
        // Build every URL first so a bad one cannot leave probes running
        let requests = targets
            .iter()
            .map(|target| {
                target
                    .request_url(self.config.origin())
                    .map(|url| (target.server, url))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let handles: Vec<(usize, AbortOnDropHandle<_>)> = requests
            .into_iter()
            .map(|(server, url)| {
                let probe = fetch_server(self.client.clone(), url, self.config.probe_timeout);
                let handle = AbortOnDropHandle::new(tokio::spawn(probe.in_current_span()));
                (server, handle)
            })
            .collect();

        let settled = join_all(handles.into_iter().map(|(server, handle)| async move {
            (server, settle(handle, cancel).await)
        }))
        .await;

        Ok(settled)
    }

    /// Merges validated responses in order, first occurrence of a URL wins
    fn merge(&self, responses: &[(usize, StreamResponse)]) -> AggregationResult {
        let mut result = AggregationResult::default();
        let mut seen_sources = HashSet::new();
        let mut seen_subtitles = HashSet::new();

        let mut source_headers = self.headers.clone();
        source_headers.insert("Referer".to_string(), format!("{}/", self.config.origin()));

        for (server, response) in responses {
            match self.build_source(*server, response, &source_headers) {
                Some(source) => {
                    if seen_sources.insert(source.url.clone()) {
                        result.sources.push(source);
                    }
                }
                None => debug!(
                    server,
                    thumbnail = %response.thumbnail,
                    "Skipping source without a usable playlist URL"
                ),
            }

            for track in &response.tracks {
                let (Some(url), Some(lang)) = (non_empty(&track.url), non_empty(&track.lang))
                else {
                    continue;
                };

                let proxied = self.proxy.create_proxy_url(url, &self.headers);
                if seen_subtitles.insert(proxied.clone()) {
                    result.subtitles.push(SubtitleTrack {
                        url: proxied,
                        label: subtitle_label(lang),
                        format: SubtitleFormat::Vtt,
                    });
                }
            }
        }

        result
    }

    fn build_source(
        &self,
        server: usize,
        response: &StreamResponse,
        headers: &OutboundHeaders,
    ) -> Option<Source> {
        let thumbnail = self.resolve_thumbnail(&response.thumbnail);
        let playlist = playlist_url(&thumbnail);
        if parse_http_url("playlist", &playlist).is_err() {
            return None;
        }

        let audio_tracks = response
            .audio_tracks
            .iter()
            .map(|track| {
                let language = track.lang.clone().unwrap_or_default();
                AudioTrack {
                    label: format!(
                        "{} ({})",
                        track.name.as_deref().unwrap_or_default(),
                        track.flag.as_deref().unwrap_or_default()
                    ),
                    default: language == "en",
                    language,
                }
            })
            .collect();

        let server_name = response
            .server_info
            .as_ref()
            .and_then(|info| non_empty(&info.name))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Server {}", server));

        Some(Source {
            url: self.proxy.create_proxy_url(&playlist, headers),
            kind: SourceKind::Hls,
            quality: QUALITY_LABEL.to_string(),
            audio_tracks,
            provider: SourceProvider {
                id: Self::ID.to_string(),
                name: format!("{} ({})", Self::NAME, server_name),
            },
        })
    }

    /// Opens enveloped thumbnail references; plain URLs pass through
    fn resolve_thumbnail(&self, thumbnail: &str) -> String {
        if thumbnail.starts_with("http://") || thumbnail.starts_with("https://") {
            return thumbnail.to_string();
        }

        match self.decoder.decode(thumbnail) {
            decoded if decoded.is_empty() => thumbnail.to_string(),
            decoded => decoded.trim().to_string(),
        }
    }

    fn empty_result(&self, message: &str) -> AggregationResult {
        warn!(reason = %message, "VidZee empty result");
        AggregationResult::failed(Diagnostic::provider_error(format!(
            "{}: {}",
            Self::NAME,
            message
        )))
    }
}

#[async_trait]
impl Provider for VidZeeProvider {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supported_content_types: vec![ContentType::Movies, ContentType::Tv],
        }
    }

    async fn get_movie_sources(&self, media: &MediaObject) -> AggregationResult {
        self.aggregate(media, MediaKind::Movie).await
    }

    async fn get_tv_sources(&self, media: &MediaObject) -> AggregationResult {
        self.aggregate(media, MediaKind::Tv).await
    }

    async fn health_check(&self) -> bool {
        let response = self
            .client
            .head(self.config.origin())
            .timeout(self.config.health_timeout)
            .send()
            .await;

        match response {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }
}

/// Performs one probe: GET, status check, size limit, shape check
async fn fetch_server(
    client: Client,
    url: Url,
    timeout: Duration,
) -> Result<StreamResponse, ProviderError> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Http {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }

    if let Some(size) = response.content_length() {
        if size > MAX_RESPONSE_SIZE {
            return Err(ProviderError::ResponseTooLarge { size });
        }
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;
    if body.len() as u64 > MAX_RESPONSE_SIZE {
        return Err(ProviderError::ResponseTooLarge {
            size: body.len() as u64,
        });
    }

    parse_stream_response(&body)
}

/// Waits for a probe task, giving up (and aborting it) on cancellation
///
/// Returns `None` when the probe was abandoned.
async fn settle(
    mut handle: AbortOnDropHandle<Result<StreamResponse, ProviderError>>,
    cancel: &CancellationToken,
) -> Option<Result<StreamResponse, ProviderError>> {
    tokio::select! {
        biased;
        joined = &mut handle => {
            Some(joined.unwrap_or_else(|e| Err(ProviderError::Task(e.to_string()))))
        }
        _ = cancel.cancelled() => {
            handle.abort();
            None
        }
    }
}

fn header_map(headers: &OutboundHeaders) -> Result<HeaderMap, ProviderError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ProviderError::InvalidHeader(e.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| ProviderError::InvalidHeader(e.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Swaps the thumbnail track suffix for the playlist file
///
/// Values without the suffix are returned unchanged.
fn playlist_url(thumbnail: &str) -> String {
    match thumbnail.strip_suffix(THUMBNAIL_SUFFIX) {
        Some(base) => format!("{}{}", base, PLAYLIST_SUFFIX),
        None => thumbnail.to_string(),
    }
}

/// Drops digits from a language code and trims it ("en2" -> "en")
fn subtitle_label(lang: &str) -> String {
    lang.chars()
        .filter(|c| !c.is_ascii_digit())
        .collect::<String>()
        .trim()
        .to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
