//! Adapter over the external text-recognition engine.

use async_trait::async_trait;
use serde::Serialize;

use super::file::UploadedFile;

/// Progress update surfaced to the applicant while a document is processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcrProgress {
    pub progress: u8,
    pub status: String,
}

impl OcrProgress {
    pub fn new(progress: u8, status: impl Into<String>) -> Self {
        Self {
            progress: progress.min(100),
            status: status.into(),
        }
    }

    pub fn idle() -> Self {
        Self::new(0, "Waiting for upload")
    }
}

/// Raw text plus the engine's error, if recognition failed part way.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecognitionOutcome {
    pub text: String,
    pub error: Option<String>,
}

impl RecognitionOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// External OCR engine. Must be callable per file independently.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(
        &self,
        file: &UploadedFile,
        on_progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> RecognitionOutcome;
}

/// Run recognition, rejecting unsupported file types before the engine sees them.
pub async fn recognize_file(
    recognizer: &dyn TextRecognizer,
    file: &UploadedFile,
    on_progress: &(dyn Fn(OcrProgress) + Send + Sync),
) -> RecognitionOutcome {
    if !file.is_supported() {
        return RecognitionOutcome::failed(format!(
            "unsupported file type '{}'; upload an image or PDF",
            file.content_type
        ));
    }

    if file.bytes.is_empty() {
        return RecognitionOutcome::failed("the selected file is empty");
    }

    let clamp = |update: OcrProgress| on_progress(OcrProgress::new(update.progress, update.status));
    recognizer.recognize(file, &clamp).await
}
