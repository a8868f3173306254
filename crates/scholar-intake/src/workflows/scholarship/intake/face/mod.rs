//! Face verification between the ID photo and a live capture.

mod capture;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::workflows::scholarship::payload::FaceMatchSummary;

pub use capture::{Camera, CaptureError, CaptureProtocol, COUNTDOWN_SECS};

/// Descriptors closer than this belong to the same person.
pub const MATCH_THRESHOLD: f32 = 0.6;
/// Reported distance when either image has no detectable face.
pub const NO_FACE_DISTANCE: f32 = 999.0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FaceError {
    #[error("face models failed to load: {0}")]
    ModelLoad(String),
    #[error("image could not be decoded: {0}")]
    Decode(String),
}

/// Embedding of a single detected face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceDescriptor(Vec<f32>);

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance; descriptors of different length never match.
    pub fn distance(&self, other: &Self) -> f32 {
        if self.0.len() != other.0.len() {
            return NO_FACE_DISTANCE;
        }

        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

/// Loaded detection and recognition networks.
pub trait FaceModels: Send + Sync {
    /// Descriptor for the single most prominent face, or `None` if no face was found.
    fn descriptor(&self, image: &[u8]) -> Result<Option<FaceDescriptor>, FaceError>;
}

#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn FaceModels>, FaceError>;
}

/// Outcome of comparing two images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMatchResult {
    distance: Option<f32>,
    is_match: bool,
}

impl FaceMatchResult {
    pub fn from_distance(distance: f32) -> Self {
        Self {
            distance: Some(distance),
            is_match: distance < MATCH_THRESHOLD,
        }
    }

    pub const fn no_face() -> Self {
        Self {
            distance: None,
            is_match: false,
        }
    }

    /// Measured distance; `None` when no face was detected.
    pub fn distance(&self) -> Option<f32> {
        self.distance
    }

    /// Distance as sent over the wire, where the no-face sentinel is 999.
    pub fn wire_distance(&self) -> f32 {
        self.distance.unwrap_or(NO_FACE_DISTANCE)
    }

    pub fn is_match(&self) -> bool {
        self.is_match
    }

    pub fn summary(&self) -> FaceMatchSummary {
        FaceMatchSummary {
            distance: self.wire_distance(),
            is_match: self.is_match,
        }
    }
}

/// Captured frame and the match attempt made with it.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceCapture {
    pub frame: Vec<u8>,
    pub result: FaceMatchResult,
}

/// Lazily loads models once and compares faces.
pub struct FaceVerificationEngine {
    loader: Arc<dyn ModelLoader>,
    models: OnceCell<Arc<dyn FaceModels>>,
}

impl FaceVerificationEngine {
    pub fn new(loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            loader,
            models: OnceCell::new(),
        }
    }

    /// Load the models if not already loaded. A failed load is retried on the next call.
    pub async fn load_models(&self) -> Result<Arc<dyn FaceModels>, FaceError> {
        let models = self
            .models
            .get_or_try_init(|| async {
                let models = self.loader.load().await?;
                info!("face models loaded");
                Ok::<_, FaceError>(models)
            })
            .await?;
        Ok(Arc::clone(models))
    }

    pub fn models_loaded(&self) -> bool {
        self.models.initialized()
    }

    /// Compare the face on the ID with the captured frame.
    ///
    /// Missing or undecodable faces produce the no-face result; only a model
    /// load failure is an error.
    pub async fn match_faces(
        &self,
        id_image: &[u8],
        captured: &[u8],
    ) -> Result<FaceMatchResult, FaceError> {
        let models = self.load_models().await?;

        let id_descriptor = detect(models.as_ref(), id_image, "id");
        let captured_descriptor = detect(models.as_ref(), captured, "capture");

        let result = match (id_descriptor, captured_descriptor) {
            (Some(id), Some(live)) => FaceMatchResult::from_distance(id.distance(&live)),
            _ => FaceMatchResult::no_face(),
        };
        debug!(
            distance = result.wire_distance(),
            is_match = result.is_match(),
            "face comparison finished"
        );
        Ok(result)
    }
}

fn detect(models: &dyn FaceModels, image: &[u8], source: &'static str) -> Option<FaceDescriptor> {
    match models.descriptor(image) {
        Ok(Some(descriptor)) => Some(descriptor),
        Ok(None) => {
            debug!(source, "no face detected");
            None
        }
        Err(err) => {
            debug!(source, error = %err, "face detection failed");
            None
        }
    }
}

impl std::fmt::Debug for FaceVerificationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceVerificationEngine")
            .field("models_loaded", &self.models_loaded())
            .finish_non_exhaustive()
    }
}
