//! Recognition Session Controller
//!
//! Orchestrates the capture → regions → OCR → parse → match pipeline and
//! exposes its progress as an explicit state machine. Transitions are a pure
//! function of (stage, event), so the machine is unit-testable without a
//! camera or an OCR engine.
//!
//! One engine instance lives for the whole session and is reused across
//! retries; its two region passes are strictly sequential
//! (configure-for-name → recognize name → configure-for-number → recognize
//! number). The catalog call runs independently and is cancelled on reset or
//! close; a stale response is discarded rather than applied to newer state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capture::CapturedFrame;
use crate::catalog::{match_candidates, CardCatalog, ScoredCandidate};
use crate::parser::{self, RecognitionResult};
use crate::vision::{
    extract_regions, EngineConfig, EngineError, RecognitionEngine, RecognizedText, RegionKind,
};

/// Which recognition path a session is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionPath {
    /// Primary path: per-region OCR over the name and number bands
    Regions,
    /// Secondary path: one OCR pass over the whole image
    FullImage,
}

/// Session lifecycle stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStage {
    /// Nothing in flight
    Idle,
    /// A capture stream or file prompt is open
    Capturing,
    /// OCR passes are running
    Recognizing(RecognitionPath),
    /// Catalog query and ranking in progress
    Matching,
    /// Ranked candidates available; terminal for this capture
    Result,
    /// Automated parsing failed; user input required
    ManualFallback,
}

/// Events that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// User opened the recognition flow
    CaptureOpened,
    /// A frame was captured or a file was loaded
    FrameReady,
    /// Region extraction returned nothing usable
    RegionsUnavailable,
    /// Parsing produced a usable guess
    GuessParsed,
    /// Parsing produced nothing usable
    GuessRejected,
    /// The match pass finished
    CandidatesReady,
    /// User-initiated reset or retry
    Reset,
}

/// Pure transition function. `None` means the event is invalid in the stage.
pub fn transition(stage: SessionStage, event: SessionEvent) -> Option<SessionStage> {
    use SessionEvent::*;
    use SessionStage::*;

    match (stage, event) {
        (_, Reset) => Some(Idle),
        (Idle, CaptureOpened) => Some(Capturing),
        (Capturing, FrameReady) => Some(Recognizing(RecognitionPath::Regions)),
        (Recognizing(RecognitionPath::Regions), RegionsUnavailable) => {
            Some(Recognizing(RecognitionPath::FullImage))
        }
        (Recognizing(_), GuessParsed) => Some(Matching),
        (Recognizing(_), GuessRejected) => Some(ManualFallback),
        (Matching, CandidatesReady) => Some(Result),
        _ => None,
    }
}

/// Errors surfaced by the controller
#[derive(Debug, Error)]
pub enum SessionError {
    /// The engine is gone or never started; fatal to the session
    #[error("recognition engine error: {0}")]
    Engine(#[from] EngineError),
    /// The caller drove the machine out of order
    #[error("event {event:?} is not valid in stage {stage:?}")]
    InvalidTransition {
        stage: SessionStage,
        event: SessionEvent,
    },
    /// The session was reset or closed while a pass was in flight
    #[error("session was reset while work was in flight")]
    Cancelled,
}

/// Outcome of one identification attempt
#[derive(Debug)]
pub enum SessionOutcome {
    /// A guess was parsed and matched against the catalog
    Identified {
        result: RecognitionResult,
        candidates: Vec<ScoredCandidate>,
        passes: Vec<RecognizedText>,
    },
    /// Parsing failed; the user types the card in, with a best-effort prefill
    ManualFallback {
        prefill: Option<String>,
        raw_text: String,
    },
}

/// One open recognition flow.
///
/// Created when the user opens the flow, dropped when it closes or a card is
/// accepted. All mutation is interior, so the session can be shared behind an
/// `Arc` and observed (stage, last result) while work is in flight.
pub struct RecognitionSession {
    id: Uuid,
    engine: RecognitionEngine,
    catalog: Arc<dyn CardCatalog>,
    catalog_limit: u32,
    catalog_lang: String,
    stage: RwLock<SessionStage>,
    /// Bumped on every reset; in-flight work from an older generation is stale
    generation: AtomicU64,
    cancel: RwLock<CancellationToken>,
    last_result: RwLock<Option<RecognitionResult>>,
    candidates: RwLock<Vec<ScoredCandidate>>,
}

impl RecognitionSession {
    /// Open a session over an engine and a catalog
    pub fn new(
        engine: RecognitionEngine,
        catalog: Arc<dyn CardCatalog>,
        catalog_limit: u32,
        catalog_lang: impl Into<String>,
    ) -> Self {
        let id = Uuid::new_v4();
        info!("Recognition session {} opened", id);
        Self {
            id,
            engine,
            catalog,
            catalog_limit,
            catalog_lang: catalog_lang.into(),
            stage: RwLock::new(SessionStage::Idle),
            generation: AtomicU64::new(0),
            cancel: RwLock::new(CancellationToken::new()),
            last_result: RwLock::new(None),
            candidates: RwLock::new(Vec::new()),
        }
    }

    /// Session identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current stage
    pub fn stage(&self) -> SessionStage {
        *self.stage.read()
    }

    /// Last recognition result, if any
    pub fn last_result(&self) -> Option<RecognitionResult> {
        self.last_result.read().clone()
    }

    /// Current ranked candidates
    pub fn candidates(&self) -> Vec<ScoredCandidate> {
        self.candidates.read().clone()
    }

    /// Move from idle into capturing
    pub fn begin_capture(&self) -> Result<(), SessionError> {
        self.apply(SessionEvent::CaptureOpened)
    }

    /// Run the full identification pipeline over one frame.
    ///
    /// The frame is consumed; on retry the caller captures a fresh one.
    pub async fn identify(&self, frame: CapturedFrame) -> Result<SessionOutcome, SessionError> {
        self.apply(SessionEvent::FrameReady)?;

        let generation = self.generation.load(Ordering::SeqCst);
        let cancel = self.cancel.read().clone();

        let (result, passes) = match extract_regions(&frame) {
            Some(regions) => match self.recognize_regions(&regions).await? {
                Some(pair) => pair,
                None => return self.fall_back_to_manual(String::new()),
            },
            None => {
                self.apply(SessionEvent::RegionsUnavailable)?;
                match self.recognize_full_image(&frame).await? {
                    Some(pair) => pair,
                    None => return self.fall_back_to_manual(String::new()),
                }
            }
        };

        let Some(guess) = result.guess.clone() else {
            debug!("Session {}: no usable guess in {:?}", self.id, result.raw_text);
            return self.fall_back_to_manual(result.raw_text);
        };

        self.apply(SessionEvent::GuessParsed)?;
        info!(
            "Session {}: guess {:?} #{}/{} (confidence {})",
            self.id, guess.name, guess.card_number, guess.set_total, result.confidence
        );

        let candidates = tokio::select! {
            _ = cancel.cancelled() => return Err(SessionError::Cancelled),
            matched = match_candidates(
                &*self.catalog,
                &guess,
                self.catalog_limit,
                &self.catalog_lang,
            ) => match matched {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Session {}: catalog query failed: {}", self.id, e);
                    Vec::new()
                }
            },
        };

        // A reset may have landed while the catalog call was in flight
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("Session {}: discarding stale match result", self.id);
            return Err(SessionError::Cancelled);
        }

        self.apply(SessionEvent::CandidatesReady)?;
        *self.last_result.write() = Some(result.clone());
        *self.candidates.write() = candidates.clone();

        Ok(SessionOutcome::Identified {
            result,
            candidates,
            passes,
        })
    }

    /// Return to idle for a retry. The engine stays alive; in-flight
    /// matching is cancelled and its result discarded.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        {
            let mut cancel = self.cancel.write();
            cancel.cancel();
            *cancel = CancellationToken::new();
        }
        *self.stage.write() = SessionStage::Idle;
        *self.last_result.write() = None;
        self.candidates.write().clear();
        debug!("Session {} reset", self.id);
    }

    /// Close the session and dispose the engine. Pending recognitions are
    /// aborted ungracefully; this is the only way to stop them.
    pub async fn close(&self) {
        self.cancel.read().cancel();
        self.engine.dispose().await;
        info!("Recognition session {} closed", self.id);
    }

    /// Run the primary path: sequential name and number passes.
    /// `Ok(None)` means an individual pass failed and the session should
    /// fall back to manual entry.
    async fn recognize_regions(
        &self,
        regions: &crate::vision::CardRegions,
    ) -> Result<Option<(RecognitionResult, Vec<RecognizedText>)>, SessionError> {
        let name_raw = match self
            .recognize_one(RegionKind::Name, &regions.name.frame)
            .await?
        {
            Some(text) => text,
            None => return Ok(None),
        };

        let number_raw = match self
            .recognize_one(RegionKind::Number, &regions.number.frame)
            .await?
        {
            Some(text) => text,
            None => return Ok(None),
        };

        let raw_text = format!("{name_raw}\n{number_raw}");
        let guess = parser::guess_from_regions(&name_raw, &number_raw);
        let passes = vec![
            RecognizedText {
                region: RegionKind::Name,
                raw_text: name_raw,
            },
            RecognizedText {
                region: RegionKind::Number,
                raw_text: number_raw,
            },
        ];

        Ok(Some((RecognitionResult::new(guess, raw_text), passes)))
    }

    /// Run the secondary path: one unconstrained pass over the whole image
    async fn recognize_full_image(
        &self,
        frame: &CapturedFrame,
    ) -> Result<Option<(RecognitionResult, Vec<RecognizedText>)>, SessionError> {
        self.engine.configure(&EngineConfig::for_full_image()).await?;
        let raw = match self.engine.recognize(frame).await {
            Ok(text) => text,
            Err(EngineError::Disposed) => return Err(EngineError::Disposed.into()),
            Err(e) => {
                warn!("Session {}: full-image pass failed: {}", self.id, e);
                return Ok(None);
            }
        };

        let guess = parser::parse_full_text(&raw);
        Ok(Some((RecognitionResult::new(guess, raw), Vec::new())))
    }

    /// Configure and run one region pass. `Ok(None)` on a recognition
    /// failure, which is logged rather than treated as fatal.
    async fn recognize_one(
        &self,
        kind: RegionKind,
        frame: &CapturedFrame,
    ) -> Result<Option<String>, SessionError> {
        self.engine.configure(&EngineConfig::for_region(kind)).await?;
        match self.engine.recognize(frame).await {
            Ok(text) => Ok(Some(text)),
            Err(EngineError::Disposed) => Err(EngineError::Disposed.into()),
            Err(e) => {
                warn!("Session {}: {:?} pass failed: {}", self.id, kind, e);
                Ok(None)
            }
        }
    }

    /// Transition to manual fallback, prefilling a name from the first
    /// sufficiently long raw word when there is one
    fn fall_back_to_manual(&self, raw_text: String) -> Result<SessionOutcome, SessionError> {
        self.apply(SessionEvent::GuessRejected)?;
        let prefill = parser::prefill_name(&raw_text);
        info!(
            "Session {}: manual fallback (prefill: {:?})",
            self.id, prefill
        );
        Ok(SessionOutcome::ManualFallback { prefill, raw_text })
    }

    /// Apply one event to the state machine
    fn apply(&self, event: SessionEvent) -> Result<(), SessionError> {
        let mut stage = self.stage.write();
        match transition(*stage, event) {
            Some(next) => {
                debug!("Session {}: {:?} --{:?}--> {:?}", self.id, *stage, event, next);
                *stage = next;
                Ok(())
            }
            None => Err(SessionError::InvalidTransition {
                stage: *stage,
                event,
            }),
        }
    }
}
