use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::face::{FaceCapture, FaceVerificationEngine};

/// Session-scoped cancellation, checked after every await in the pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A successful match and the digest of the ID image it was computed against.
#[derive(Debug, Clone)]
struct CachedFace {
    id_digest: String,
    capture: FaceCapture,
}

/// Everything that outlives a single wizard stage: who is applying, the loaded
/// face engine, and the last successful face match.
#[derive(Debug)]
pub struct IntakeSession {
    user_id: String,
    period_id: String,
    face_engine: Arc<FaceVerificationEngine>,
    face_cache: Mutex<Option<CachedFace>>,
    cancel: CancelFlag,
}

impl IntakeSession {
    pub fn new(
        user_id: impl Into<String>,
        period_id: impl Into<String>,
        face_engine: Arc<FaceVerificationEngine>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            period_id: period_id.into(),
            face_engine,
            face_cache: Mutex::new(None),
            cancel: CancelFlag::default(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn period_id(&self) -> &str {
        &self.period_id
    }

    pub fn face_engine(&self) -> &Arc<FaceVerificationEngine> {
        &self.face_engine
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Only successful matches are cached, keyed on the ID image digest.
    pub fn remember_face(&self, id_digest: &str, capture: &FaceCapture) {
        if capture.result.is_match() {
            *self.lock_cache() = Some(CachedFace {
                id_digest: id_digest.to_string(),
                capture: capture.clone(),
            });
        }
    }

    /// The cached match, unless it was computed against a different ID image.
    pub fn cached_face(&self, id_digest: &str) -> Option<FaceCapture> {
        self.lock_cache()
            .as_ref()
            .filter(|cached| cached.id_digest == id_digest)
            .map(|cached| cached.capture.clone())
    }

    pub fn forget_face(&self) {
        self.lock_cache().take();
    }

    /// Cancel outstanding work and drop cached state.
    pub fn end(&self) {
        self.cancel.cancel();
        self.forget_face();
        debug!(user_id = %self.user_id, "intake session ended");
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, Option<CachedFace>> {
        self.face_cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
