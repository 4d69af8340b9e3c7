//! Per-item video lifecycle: resolve the primary asset (and optional poster), expose what the
//! UI should show, and map playback faults onto a fixed message taxonomy.
//!
//! Every `load` bumps a generation counter and hands out a [`ResolutionTicket`]. Results
//! carrying an older generation, or arriving after `unmount`, are dropped, so a slow
//! resolution for a superseded record can never overwrite a newer state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::assets::{extension_of, AssetReference, AssetUrlResolver, ResolvedUrl};

/// One video with an optional poster image, as embedded in a project document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    #[serde(default, deserialize_with = "crate::content::lenient")]
    pub asset: Option<AssetReference>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "crate::content::lenient")]
    pub thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub asset: AssetReference,
    #[serde(default)]
    pub alt: Option<String>,
}

/// Everything that can end a media item in the error view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("No video asset found")]
    NoAsset,
    #[error("Failed to construct video URL")]
    UrlConstructionFailed,
    #[error("Video playback was aborted")]
    PlaybackAborted,
    #[error("Network error while loading video from: {url}")]
    PlaybackNetworkError { url: String },
    #[error("The video format ({extension}) is not supported by your browser")]
    PlaybackFormatUnsupported { extension: String },
    #[error("The video source ({url}) is not supported")]
    PlaybackSourceUnsupported { url: String },
    #[error("An error occurred while playing the video: {}", .message.as_deref().unwrap_or("Unknown error"))]
    PlaybackUnknown { message: Option<String> },
    #[error("No video URL available")]
    NoVideoUrl,
    #[error("Failed to play video from: {url}")]
    PlaybackFailed { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackState {
    Loading,
    Ready { video_url: ResolvedUrl, thumbnail_url: Option<ResolvedUrl> },
    Error(PlaybackError),
}

/// Error category reported by the playback subsystem (HTML `MediaError` numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    Aborted,
    Network,
    Decode,
    SourceNotSupported,
    Other(u16),
}

impl From<u16> for FaultCode {
    fn from(code: u16) -> Self {
        match code {
            1 => FaultCode::Aborted,
            2 => FaultCode::Network,
            3 => FaultCode::Decode,
            4 => FaultCode::SourceNotSupported,
            other => FaultCode::Other(other),
        }
    }
}

/// Structured failure emitted by the media element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaFault {
    /// `None` when the element failed without an error object.
    pub code: Option<FaultCode>,
    pub message: Option<String>,
    pub network_state: Option<u16>,
    pub ready_state: Option<u16>,
    /// The source the element was actually playing, if it reports one.
    pub current_src: Option<String>,
}

impl MediaFault {
    pub fn with_code(code: FaultCode) -> Self {
        Self { code: Some(code), ..Self::default() }
    }
}

/// Static lookup from fault category to message. `fallback_src` is used when the fault
/// carries no `current_src`.
pub fn classify_fault(fault: &MediaFault, fallback_src: Option<&str>) -> PlaybackError {
    let Some(src) = fault.current_src.as_deref().filter(|s| !s.is_empty()).or(fallback_src) else {
        return PlaybackError::NoVideoUrl;
    };
    match fault.code {
        Some(FaultCode::Aborted) => PlaybackError::PlaybackAborted,
        Some(FaultCode::Network) => PlaybackError::PlaybackNetworkError { url: src.to_string() },
        Some(FaultCode::Decode) => PlaybackError::PlaybackFormatUnsupported {
            extension: extension_of(src).unwrap_or_else(|| "unknown".to_string()),
        },
        Some(FaultCode::SourceNotSupported) => PlaybackError::PlaybackSourceUnsupported { url: src.to_string() },
        Some(FaultCode::Other(_)) => PlaybackError::PlaybackUnknown {
            message: fault.message.clone().filter(|m| !m.is_empty()),
        },
        None => PlaybackError::PlaybackFailed { url: src.to_string() },
    }
}

/// What the caller should draw for the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    Spinner,
    Poster { thumbnail_url: ResolvedUrl, alt: String },
    Player { src: ResolvedUrl, mime: String },
    Failed { message: String, backdrop: Option<ResolvedUrl>, alt: String },
}

/// Tags one resolution attempt. Obtained from [`PlaybackController::load`].
#[derive(Debug, Clone)]
pub struct ResolutionTicket {
    generation: u64,
    primary: Option<AssetReference>,
    thumbnail: Option<AssetReference>,
}

impl ResolutionTicket {
    pub fn generation(&self) -> u64 { self.generation }
    pub fn primary(&self) -> Option<&AssetReference> { self.primary.as_ref() }
    pub fn thumbnail(&self) -> Option<&AssetReference> { self.thumbnail.as_ref() }
}

#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub generation: u64,
    pub primary: Option<ResolvedUrl>,
    pub thumbnail: Option<ResolvedUrl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Stale,
}

/// Async seam over URL resolution so both halves of a ticket can be awaited together.
#[async_trait]
pub trait UrlSource: Send + Sync {
    async fn resolve_url(&self, reference: Option<&AssetReference>) -> Option<ResolvedUrl>;
}

#[async_trait]
impl UrlSource for AssetUrlResolver {
    async fn resolve_url(&self, reference: Option<&AssetReference>) -> Option<ResolvedUrl> {
        self.resolve(reference)
    }
}

/// Resolve primary and thumbnail concurrently; completion order between them is irrelevant.
pub async fn resolve_ticket<S: UrlSource + ?Sized>(source: &S, ticket: &ResolutionTicket) -> ResolutionOutcome {
    let (primary, thumbnail) = futures::join!(
        source.resolve_url(ticket.primary.as_ref()),
        async {
            match ticket.thumbnail.as_ref() {
                Some(t) => source.resolve_url(Some(t)).await,
                None => None,
            }
        }
    );
    ResolutionOutcome { generation: ticket.generation, primary, thumbnail }
}

#[derive(Debug)]
pub struct PlaybackController {
    record: Option<MediaRecord>,
    state: PlaybackState,
    playing: bool,
    // fixed when Ready is entered; a later thumbnail never swaps the player out
    poster: bool,
    generation: u64,
    mounted: bool,
    // thumbnail kept outside Ready: before the primary lands, or as the error backdrop
    early_thumbnail: Option<ResolvedUrl>,
}

impl Default for PlaybackController {
    fn default() -> Self { Self::new() }
}

impl PlaybackController {
    pub fn new() -> Self {
        Self {
            record: None,
            state: PlaybackState::Loading,
            playing: false,
            poster: false,
            generation: 0,
            mounted: true,
            early_thumbnail: None,
        }
    }

    /// Start over with a new record. Any in-flight ticket becomes stale.
    pub fn load(&mut self, record: MediaRecord) -> ResolutionTicket {
        self.generation += 1;
        self.mounted = true;
        self.playing = false;
        self.poster = false;
        self.early_thumbnail = None;
        self.state = PlaybackState::Loading;
        let ticket = ResolutionTicket {
            generation: self.generation,
            primary: record.asset.clone(),
            thumbnail: record.thumbnail.as_ref().map(|t| t.asset.clone()),
        };
        tracing::debug!(generation = self.generation, title = ?record.title, "loading media record");
        self.record = Some(record);
        ticket
    }

    /// Teardown: everything still in flight is ignored from now on.
    pub fn unmount(&mut self) {
        self.mounted = false;
        self.generation += 1;
    }

    pub fn state(&self) -> &PlaybackState { &self.state }

    pub fn is_playing(&self) -> bool { self.playing }

    pub fn record(&self) -> Option<&MediaRecord> { self.record.as_ref() }

    fn is_current(&self, generation: u64) -> bool {
        if !self.mounted || generation != self.generation {
            tracing::debug!(generation, current = self.generation, "discarding stale resolution");
            return false;
        }
        true
    }

    pub fn finish_primary(&mut self, ticket: &ResolutionTicket, url: Option<ResolvedUrl>) -> Applied {
        self.finish_primary_for(ticket.generation, url)
    }

    fn finish_primary_for(&mut self, generation: u64, url: Option<ResolvedUrl>) -> Applied {
        if !self.is_current(generation) {
            return Applied::Stale;
        }
        if !matches!(self.state(), PlaybackState::Loading) {
            return Applied::Stale;
        }
        let has_asset = self.record.as_ref().is_some_and(|r| r.asset.is_some());
        let next = match (has_asset, url) {
            (false, _) => PlaybackState::Error(PlaybackError::NoAsset),
            (true, None) => PlaybackState::Error(PlaybackError::UrlConstructionFailed),
            (true, Some(video_url)) => PlaybackState::Ready { video_url, thumbnail_url: self.early_thumbnail.take() },
        };
        self.poster = matches!(next, PlaybackState::Ready { thumbnail_url: Some(_), .. });
        if let PlaybackState::Error(e) = &next {
            tracing::warn!(error = %e, "media item failed to resolve");
        }
        self.state = next;
        Applied::Applied
    }

    /// Thumbnail failures are never fatal; `None` just leaves the poster absent. A thumbnail
    /// arriving after `Ready` is kept only as the error backdrop.
    pub fn finish_thumbnail(&mut self, ticket: &ResolutionTicket, url: Option<ResolvedUrl>) -> Applied {
        self.finish_thumbnail_for(ticket.generation, url)
    }

    fn finish_thumbnail_for(&mut self, generation: u64, url: Option<ResolvedUrl>) -> Applied {
        if !self.is_current(generation) {
            return Applied::Stale;
        }
        match &mut self.state {
            PlaybackState::Ready { thumbnail_url, .. } => *thumbnail_url = url,
            PlaybackState::Loading => self.early_thumbnail = url,
            PlaybackState::Error(_) => {}
        }
        Applied::Applied
    }

    /// Apply both halves of an outcome, primary first.
    pub fn apply(&mut self, outcome: ResolutionOutcome) -> Applied {
        if !self.is_current(outcome.generation) {
            return Applied::Stale;
        }
        self.finish_thumbnail_for(outcome.generation, outcome.thumbnail);
        self.finish_primary_for(outcome.generation, outcome.primary)
    }

    /// Poster click. Once playing, the poster never comes back for this record.
    pub fn play(&mut self) {
        if matches!(self.state(), PlaybackState::Ready { .. }) {
            self.playing = true;
        }
    }

    /// Map a fault from the media element into the error state. Only meaningful while Ready.
    pub fn report_fault(&mut self, fault: &MediaFault) {
        let PlaybackState::Ready { video_url, thumbnail_url } = self.state() else {
            tracing::debug!("ignoring playback fault outside of ready state");
            return;
        };
        let error = classify_fault(fault, Some(video_url.as_str()));
        let backdrop = thumbnail_url.clone();
        tracing::warn!(
            error = %error,
            code = ?fault.code,
            network_state = ?fault.network_state,
            ready_state = ?fault.ready_state,
            "video playback failed"
        );
        self.early_thumbnail = backdrop;
        self.state = PlaybackState::Error(error);
    }

    fn alt_text(&self) -> String {
        let record = self.record.as_ref();
        record
            .and_then(|r| r.thumbnail.as_ref())
            .and_then(|t| t.alt.clone())
            .or_else(|| record.and_then(|r| r.title.clone()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Video thumbnail".to_string())
    }

    pub fn presentation(&self) -> Presentation {
        match self.state() {
            PlaybackState::Loading => Presentation::Spinner,
            PlaybackState::Ready { thumbnail_url: Some(thumb), .. } if self.poster && !self.playing => {
                Presentation::Poster { thumbnail_url: thumb.clone(), alt: self.alt_text() }
            }
            PlaybackState::Ready { video_url, .. } => Presentation::Player {
                src: video_url.clone(),
                mime: format!("video/{}", extension_of(video_url.as_str()).unwrap_or_else(|| "mp4".to_string())),
            },
            PlaybackState::Error(e) => Presentation::Failed {
                message: e.to_string(),
                backdrop: self.last_thumbnail(),
                alt: self.alt_text(),
            },
        }
    }

    fn last_thumbnail(&self) -> Option<ResolvedUrl> {
        match self.state() {
            PlaybackState::Ready { thumbnail_url, .. } => thumbnail_url.clone(),
            _ => self.early_thumbnail.clone(),
        }
    }
}
