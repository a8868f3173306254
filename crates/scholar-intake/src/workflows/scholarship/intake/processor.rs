//! OCR followed by structured extraction for a single document slot.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::workflows::scholarship::payload::DocumentKind;

use super::draft::{ProcessedDocument, ProcessingOutcome};
use super::extraction::{ExtractionChannel, ExtractionError, StructuredExtractor};
use super::file::{FileIdentity, UploadedFile};
use super::ocr::{recognize_file, OcrProgress, TextRecognizer};
use super::session::CancelFlag;

/// OCR progress is scaled into this share of the slot's progress bar.
const OCR_PROGRESS_SHARE: u16 = 80;
const NO_TEXT_WARNING: &str =
    "No text was found in this file. Fill in the details manually or upload a clearer copy.";

/// Owned snapshot of a slot, so several slots can be processed at once.
#[derive(Debug, Clone)]
pub struct SlotJob {
    pub kind: DocumentKind,
    pub file: UploadedFile,
    pub identity: FileIdentity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotRun {
    Completed(ProcessedDocument),
    /// Extraction failed in a way a retry may fix.
    Transient(ExtractionError),
    Cancelled,
}

pub struct DocumentProcessor {
    recognizer: Arc<dyn TextRecognizer>,
    extractor: Arc<dyn StructuredExtractor>,
}

impl DocumentProcessor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, extractor: Arc<dyn StructuredExtractor>) -> Self {
        Self {
            recognizer,
            extractor,
        }
    }

    pub async fn run(
        &self,
        job: SlotJob,
        user_id: Option<&str>,
        cancel: &CancelFlag,
        progress: &watch::Sender<OcrProgress>,
    ) -> SlotRun {
        let SlotJob {
            kind,
            file,
            identity,
        } = job;
        progress.send_replace(OcrProgress::new(0, "Reading document"));

        let recognition = recognize_file(self.recognizer.as_ref(), &file, &|update| {
            let scaled = u16::from(update.progress.min(100)) * OCR_PROGRESS_SHARE / 100;
            progress.send_replace(OcrProgress::new(scaled as u8, update.status));
        })
        .await;
        if cancel.is_cancelled() {
            return SlotRun::Cancelled;
        }

        if !recognition.has_text() {
            let warning = recognition.error.unwrap_or_else(|| NO_TEXT_WARNING.to_string());
            warn!(slot = kind.code(), file = %file.name, %warning, "no text recognized");
            return SlotRun::Completed(ProcessedDocument {
                identity,
                ocr_text: String::new(),
                outcome: ProcessingOutcome::NoText { warning },
            });
        }

        progress.send_replace(OcrProgress::new(90, "Extracting details"));
        let extracted = self
            .extractor
            .extract(
                ExtractionChannel::from(kind),
                &recognition.text,
                Some(&file),
                user_id,
            )
            .await;
        if cancel.is_cancelled() {
            return SlotRun::Cancelled;
        }

        let outcome = match extracted {
            Ok(Some(fields)) => {
                info!(slot = kind.code(), fields = fields.len(), "document extracted");
                ProcessingOutcome::Extracted(fields)
            }
            Ok(None) => {
                info!(slot = kind.code(), "extraction returned no data");
                ProcessingOutcome::NothingExtracted
            }
            Err(err) if err.is_transient() => {
                warn!(slot = kind.code(), error = %err, "extraction failed; slot can be retried");
                return SlotRun::Transient(err);
            }
            Err(err) => {
                warn!(slot = kind.code(), error = %err, "extraction failed; manual entry required");
                ProcessingOutcome::ExtractionFailed(err)
            }
        };

        SlotRun::Completed(ProcessedDocument {
            identity,
            ocr_text: recognition.text,
            outcome,
        })
    }
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor").finish_non_exhaustive()
    }
}
