//! Text recognition engine
//!
//! A long-lived, reusable OCR worker. The engine is expensive to initialize,
//! so a session creates it once and drives it through configure/recognize
//! pairs: sparse-text with a letters whitelist for the name band, then
//! sparse-text with a digits whitelist for the number band, then optionally
//! an unconstrained pass over the whole image.
//!
//! The underlying backend is a single stateful resource; its whitelist and
//! segmentation mode are mutated between passes. All access goes through a
//! `tokio::sync::Mutex` held across the blocking OCR call, so two recognize
//! calls can never interleave against the same backend.

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::capture::CapturedFrame;
use crate::vision::regions::RegionKind;

/// Errors raised by the recognition engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// The backend could not start; fatal to the session
    #[error("recognition engine failed to initialize: {0}")]
    Init(String),
    /// The engine was disposed and cannot serve further calls
    #[error("recognition engine already disposed")]
    Disposed,
    /// An individual recognize call failed; the session falls back to manual entry
    #[error("text recognition failed: {0}")]
    Recognition(String),
}

/// Page segmentation strategy for an OCR pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationMode {
    /// Find sparse text in no particular order (card bands)
    SparseText,
    /// Fully automatic segmentation (whole-image fallback)
    Auto,
}

impl SegmentationMode {
    /// Tesseract page segmentation mode number
    pub fn as_psm(self) -> &'static str {
        match self {
            SegmentationMode::SparseText => "11",
            SegmentationMode::Auto => "3",
        }
    }
}

/// Letters (including accented forms), space, hyphen, apostrophe and the
/// gender glyphs that appear in some card names.
const NAME_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz\
     ÀÂÄÇÈÉÊËÎÏÔÖÙÛÜàâäçèéêëîïôöùûü '-♂♀";

/// Digits, slash and space for the collector-number band
const NUMBER_WHITELIST: &str = "0123456789/ ";

/// One OCR pass configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Characters the backend may emit; empty means unrestricted
    pub whitelist: String,
    /// Segmentation strategy
    pub segmentation: SegmentationMode,
}

impl EngineConfig {
    /// Configuration for a cropped card band
    pub fn for_region(kind: RegionKind) -> Self {
        match kind {
            RegionKind::Name => Self {
                whitelist: NAME_WHITELIST.to_string(),
                segmentation: SegmentationMode::SparseText,
            },
            RegionKind::Number => Self {
                whitelist: NUMBER_WHITELIST.to_string(),
                segmentation: SegmentationMode::SparseText,
            },
        }
    }

    /// Unrestricted configuration for the whole-image fallback pass
    pub fn for_full_image() -> Self {
        Self {
            whitelist: String::new(),
            segmentation: SegmentationMode::Auto,
        }
    }
}

/// Abstraction over a blocking OCR backend.
///
/// Implementations hold the native resource and apply configuration changes
/// in place; they are driven exclusively through `RecognitionEngine`.
pub trait TextRecognizer: Send {
    /// Apply whitelist and segmentation settings
    fn configure(&mut self, config: &EngineConfig) -> Result<(), EngineError>;
    /// Recognize text in an RGBA frame
    fn recognize(&mut self, frame: &CapturedFrame) -> Result<String, EngineError>;
}

/// Reusable recognition engine with an explicit lifecycle.
///
/// `dispose` is explicit and idempotent; after disposal every call returns
/// `EngineError::Disposed`. Dropping the engine without disposing it drops
/// the backend with it, but callers should dispose deliberately on session
/// close.
pub struct RecognitionEngine {
    inner: Mutex<Option<Box<dyn TextRecognizer>>>,
}

impl RecognitionEngine {
    /// Wrap an already-initialized backend
    pub fn new(backend: Box<dyn TextRecognizer>) -> Self {
        info!("Recognition engine created");
        Self {
            inner: Mutex::new(Some(backend)),
        }
    }

    /// Create an engine over the default Tesseract backend.
    ///
    /// `language` is a tessdata language code such as "eng" or "fra";
    /// `data_path` optionally points at a tessdata directory.
    #[cfg(feature = "tesseract")]
    pub fn with_default_backend(
        language: &str,
        data_path: Option<&str>,
    ) -> Result<Self, EngineError> {
        let backend = tesseract_backend::TesseractRecognizer::new(data_path, language)?;
        Ok(Self::new(Box::new(backend)))
    }

    /// Create an engine over the default Tesseract backend.
    #[cfg(not(feature = "tesseract"))]
    pub fn with_default_backend(
        _language: &str,
        _data_path: Option<&str>,
    ) -> Result<Self, EngineError> {
        Err(EngineError::Init(
            "no OCR backend compiled in; rebuild with the `tesseract` feature".into(),
        ))
    }

    /// Apply a pass configuration to the backend
    pub async fn configure(&self, config: &EngineConfig) -> Result<(), EngineError> {
        let mut guard = self.inner.lock().await;
        let backend = guard.as_mut().ok_or(EngineError::Disposed)?;
        debug!(
            "Configuring engine: {:?} segmentation, {} whitelist chars",
            config.segmentation,
            config.whitelist.chars().count()
        );
        backend.configure(config)
    }

    /// Run one recognition pass over a frame.
    ///
    /// The backend lock is held for the full duration of the blocking call,
    /// which serializes concurrent callers. There is no caller timeout; a
    /// pathological input can keep this pending until disposal.
    pub async fn recognize(&self, frame: &CapturedFrame) -> Result<String, EngineError> {
        let mut guard = self.inner.lock().await;
        let mut backend = guard.take().ok_or(EngineError::Disposed)?;

        let input = frame.clone();
        let (backend, result) = tokio::task::spawn_blocking(move || {
            let result = backend.recognize(&input);
            (backend, result)
        })
        .await
        .map_err(|e| EngineError::Recognition(format!("recognition task aborted: {e}")))?;

        *guard = Some(backend);

        let text = result?;
        debug!("Recognized {} chars of raw text", text.chars().count());
        Ok(text)
    }

    /// Release the backend. Safe to call more than once.
    pub async fn dispose(&self) {
        let mut guard = self.inner.lock().await;
        if guard.take().is_some() {
            info!("Recognition engine disposed");
        }
    }

    /// Whether the engine has been disposed
    pub async fn is_disposed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    //! Tesseract backend via leptess

    use leptess::{LepTess, Variable};

    use super::{EngineConfig, EngineError, TextRecognizer};
    use crate::capture::CapturedFrame;

    /// OCR backend backed by a native Tesseract instance
    pub struct TesseractRecognizer {
        inner: LepTess,
    }

    impl TesseractRecognizer {
        /// Initialize Tesseract for the given language
        pub fn new(data_path: Option<&str>, language: &str) -> Result<Self, EngineError> {
            let inner = LepTess::new(data_path, language)
                .map_err(|e| EngineError::Init(e.to_string()))?;
            Ok(Self { inner })
        }
    }

    impl TextRecognizer for TesseractRecognizer {
        fn configure(&mut self, config: &EngineConfig) -> Result<(), EngineError> {
            self.inner
                .set_variable(Variable::TesseditCharWhitelist, &config.whitelist)
                .map_err(|e| EngineError::Recognition(e.to_string()))?;
            self.inner
                .set_variable(Variable::TesseditPagesegMode, config.segmentation.as_psm())
                .map_err(|e| EngineError::Recognition(e.to_string()))?;
            Ok(())
        }

        fn recognize(&mut self, frame: &CapturedFrame) -> Result<String, EngineError> {
            // leptess wants encoded bytes, so round-trip through PNG
            let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
                .ok_or_else(|| EngineError::Recognition("malformed frame buffer".into()))?;
            let mut bytes = Vec::new();
            image
                .write_to(
                    &mut std::io::Cursor::new(&mut bytes),
                    image::ImageFormat::Png,
                )
                .map_err(|e| EngineError::Recognition(e.to_string()))?;

            self.inner
                .set_image_from_mem(&bytes)
                .map_err(|e| EngineError::Recognition(e.to_string()))?;
            self.inner
                .get_utf8_text()
                .map_err(|e| EngineError::Recognition(e.to_string()))
        }
    }
}

#[cfg(test)]
pub mod mock {
    //! Scripted backend for exercising the pipeline without Tesseract

    use std::collections::VecDeque;

    use super::{EngineConfig, EngineError, TextRecognizer};
    use crate::capture::CapturedFrame;

    /// Returns pre-set strings in order, one per recognize call
    pub struct MockRecognizer {
        responses: VecDeque<Result<String, EngineError>>,
        pub configs_seen: Vec<EngineConfig>,
    }

    impl MockRecognizer {
        pub fn new<I, S>(responses: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            Self {
                responses: responses.into_iter().map(|s| Ok(s.into())).collect(),
                configs_seen: Vec::new(),
            }
        }

        /// A mock whose next recognize call fails
        pub fn failing(message: &str) -> Self {
            let mut responses = VecDeque::new();
            responses.push_back(Err(EngineError::Recognition(message.to_string())));
            Self {
                responses,
                configs_seen: Vec::new(),
            }
        }
    }

    impl TextRecognizer for MockRecognizer {
        fn configure(&mut self, config: &EngineConfig) -> Result<(), EngineError> {
            self.configs_seen.push(config.clone());
            Ok(())
        }

        fn recognize(&mut self, _frame: &CapturedFrame) -> Result<String, EngineError> {
            self.responses
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockRecognizer;
    use super::*;

    fn blank_frame() -> CapturedFrame {
        CapturedFrame::new(vec![0; 16], 2, 2)
    }

    #[tokio::test]
    async fn test_recognize_returns_scripted_text() {
        let engine = RecognitionEngine::new(Box::new(MockRecognizer::new(["Pikachu", "25/102"])));

        engine
            .configure(&EngineConfig::for_region(RegionKind::Name))
            .await
            .unwrap();
        assert_eq!(engine.recognize(&blank_frame()).await.unwrap(), "Pikachu");

        engine
            .configure(&EngineConfig::for_region(RegionKind::Number))
            .await
            .unwrap();
        assert_eq!(engine.recognize(&blank_frame()).await.unwrap(), "25/102");
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let engine = RecognitionEngine::new(Box::new(MockRecognizer::new(["x"])));

        engine.dispose().await;
        engine.dispose().await;
        assert!(engine.is_disposed().await);
    }

    #[tokio::test]
    async fn test_calls_after_dispose_fail() {
        let engine = RecognitionEngine::new(Box::new(MockRecognizer::new(["x"])));
        engine.dispose().await;

        let config = EngineConfig::for_region(RegionKind::Name);
        assert!(matches!(
            engine.configure(&config).await,
            Err(EngineError::Disposed)
        ));
        assert!(matches!(
            engine.recognize(&blank_frame()).await,
            Err(EngineError::Disposed)
        ));
    }

    #[tokio::test]
    async fn test_recognition_failure_is_reported() {
        let engine = RecognitionEngine::new(Box::new(MockRecognizer::failing("blurred input")));
        let err = engine.recognize(&blank_frame()).await.unwrap_err();
        assert!(matches!(err, EngineError::Recognition(_)));
        // A failed pass does not poison the engine
        assert!(!engine.is_disposed().await);
    }

    #[test]
    fn test_region_configs() {
        let name = EngineConfig::for_region(RegionKind::Name);
        assert_eq!(name.segmentation, SegmentationMode::SparseText);
        assert!(name.whitelist.contains('é'));
        assert!(name.whitelist.contains('\''));
        assert!(name.whitelist.contains('-'));
        assert!(name.whitelist.contains('♂'));
        assert!(!name.whitelist.contains('7'));

        let number = EngineConfig::for_region(RegionKind::Number);
        assert_eq!(number.segmentation, SegmentationMode::SparseText);
        assert!(number.whitelist.contains('/'));
        assert!(number.whitelist.contains('0'));
        assert!(!number.whitelist.contains('a'));

        let full = EngineConfig::for_full_image();
        assert_eq!(full.segmentation, SegmentationMode::Auto);
        assert!(full.whitelist.is_empty());
    }

    #[test]
    fn test_psm_mapping() {
        assert_eq!(SegmentationMode::SparseText.as_psm(), "11");
        assert_eq!(SegmentationMode::Auto.as_psm(), "3");
    }
}
