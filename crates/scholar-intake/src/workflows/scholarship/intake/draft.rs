use chrono::NaiveDate;
use serde::Serialize;

use crate::workflows::scholarship::payload::{ApplicationType, DocumentKind, PersonalInfo};
use crate::workflows::scholarship::validation::{missing_fields, PersonalSection, Requirement};

use super::controller::IntakeStage;
use super::dates::{age_on, parse_birth_date};
use super::extraction::{ExtractionError, NormalizedFields};
use super::face::FaceCapture;
use super::file::{FileIdentity, UploadedFile};
use super::ocr::OcrProgress;

/// Extracted ages at or above this are misreads and fall back to the birth date.
const MAX_PLAUSIBLE_AGE: f64 = 150.0;

/// How a processing pass for one slot ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    Extracted(NormalizedFields),
    /// The channel answered but every field was empty.
    NothingExtracted,
    /// A terminal extraction error; the applicant fills the details in manually.
    ExtractionFailed(ExtractionError),
    /// OCR produced no text, so extraction was not attempted.
    NoText { warning: String },
}

impl ProcessingOutcome {
    pub fn fields(&self) -> Option<&NormalizedFields> {
        match self {
            Self::Extracted(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn warning(&self) -> Option<String> {
        match self {
            Self::Extracted(_) => None,
            Self::NothingExtracted => {
                Some("No details could be read from this document; enter them manually.".to_string())
            }
            Self::ExtractionFailed(err) => Some(err.user_message().to_string()),
            Self::NoText { warning } => Some(warning.clone()),
        }
    }
}

/// Result of the last finished pass, kept for the re-processing guard.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    pub identity: FileIdentity,
    pub ocr_text: String,
    pub outcome: ProcessingOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotStatus {
    Empty,
    AwaitingProcessing,
    Processing,
    Finished,
    /// A transient failure; the slot can be retried.
    RetryNeeded { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotState {
    kind: DocumentKind,
    file: Option<UploadedFile>,
    status: SlotStatus,
    processed: Option<ProcessedDocument>,
    last_error: Option<ExtractionError>,
    progress: OcrProgress,
}

impl SlotState {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            file: None,
            status: SlotStatus::Empty,
            processed: None,
            last_error: None,
            progress: OcrProgress::idle(),
        }
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn file(&self) -> Option<&UploadedFile> {
        self.file.as_ref()
    }

    pub fn status(&self) -> &SlotStatus {
        &self.status
    }

    pub fn progress(&self) -> &OcrProgress {
        &self.progress
    }

    pub fn last_error(&self) -> Option<&ExtractionError> {
        self.last_error.as_ref()
    }

    /// The finished pass for the current file, if processing is done.
    pub fn processed(&self) -> Option<&ProcessedDocument> {
        if self.is_done() {
            self.processed.as_ref()
        } else {
            None
        }
    }

    pub fn is_done(&self) -> bool {
        self.status == SlotStatus::Finished
    }

    /// Commit a confirmed file. Processing state always restarts.
    pub fn commit(&mut self, file: UploadedFile) {
        self.file = Some(file);
        self.status = SlotStatus::AwaitingProcessing;
        self.last_error = None;
        self.progress = OcrProgress::idle();
    }

    /// The cached pass for `identity`, if the last finished pass saw the same file.
    pub fn cached_for(&self, identity: &FileIdentity) -> Option<&ProcessedDocument> {
        self.processed
            .as_ref()
            .filter(|processed| &processed.identity == identity)
    }

    pub fn mark_processing(&mut self) {
        self.status = SlotStatus::Processing;
        self.last_error = None;
    }

    pub fn set_progress(&mut self, progress: OcrProgress) {
        self.progress = progress;
    }

    pub fn finish(&mut self, processed: ProcessedDocument) {
        if let ProcessingOutcome::ExtractionFailed(err) = &processed.outcome {
            self.last_error = Some(err.clone());
        }
        self.processed = Some(processed);
        self.status = SlotStatus::Finished;
        self.progress = OcrProgress::new(100, "Done");
    }

    pub fn reuse_cached(&mut self) {
        if self.processed.is_some() {
            self.status = SlotStatus::Finished;
            self.progress = OcrProgress::new(100, "Already processed");
        }
    }

    pub fn needs_retry(&mut self, err: ExtractionError) {
        self.status = SlotStatus::RetryNeeded {
            message: err.user_message().to_string(),
        };
        self.progress = OcrProgress::new(0, err.user_message());
        self.last_error = Some(err);
    }

    /// Put an interrupted pass back in the queue.
    pub fn interrupt(&mut self) {
        if self.status == SlotStatus::Processing {
            self.status = SlotStatus::AwaitingProcessing;
            self.progress = OcrProgress::idle();
        }
    }
}

/// Everything the applicant has produced so far in one wizard session.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationDraft {
    application_type: ApplicationType,
    id: SlotState,
    cog: SlotState,
    cor: SlotState,
    pub face: Option<FaceCapture>,
    pub personal: PersonalInfo,
}

impl ApplicationDraft {
    pub fn new(application_type: ApplicationType) -> Self {
        Self {
            application_type,
            id: SlotState::new(DocumentKind::Id),
            cog: SlotState::new(DocumentKind::Cog),
            cor: SlotState::new(DocumentKind::Cor),
            face: None,
            personal: PersonalInfo::default(),
        }
    }

    pub fn application_type(&self) -> ApplicationType {
        self.application_type
    }

    pub fn slot(&self, kind: DocumentKind) -> &SlotState {
        match kind {
            DocumentKind::Id => &self.id,
            DocumentKind::Cog => &self.cog,
            DocumentKind::Cor => &self.cor,
        }
    }

    pub fn slot_mut(&mut self, kind: DocumentKind) -> &mut SlotState {
        match kind {
            DocumentKind::Id => &mut self.id,
            DocumentKind::Cog => &mut self.cog,
            DocumentKind::Cor => &mut self.cor,
        }
    }

    /// What still blocks `stage` from completing. Empty means the stage may be left.
    pub fn unmet_requirements(&self, stage: IntakeStage) -> Vec<Requirement> {
        match stage {
            IntakeStage::IdUpload => self.document_requirements(&[DocumentKind::Id]),
            IntakeStage::FaceScan => match &self.face {
                Some(capture) if capture.result.is_match() => Vec::new(),
                _ => vec![Requirement::FaceMatch],
            },
            IntakeStage::PersonalInfo => missing_fields(PersonalSection::Identity, &self.personal),
            IntakeStage::PersonalInfoContinued => {
                missing_fields(PersonalSection::Background, &self.personal)
            }
            IntakeStage::Documents => {
                self.document_requirements(&[DocumentKind::Cog, DocumentKind::Cor])
            }
        }
    }

    /// Every requirement across the stages this application type goes through.
    pub fn all_unmet_requirements(&self) -> Vec<Requirement> {
        IntakeStage::ordered_for(self.application_type)
            .iter()
            .flat_map(|stage| self.unmet_requirements(*stage))
            .collect()
    }

    fn document_requirements(&self, kinds: &[DocumentKind]) -> Vec<Requirement> {
        let mut unmet = Vec::new();
        for kind in kinds {
            let slot = self.slot(*kind);
            if slot.file().is_none() {
                unmet.push(Requirement::DocumentFile(*kind));
            } else if !slot.is_done() {
                unmet.push(Requirement::DocumentProcessed(*kind));
            }
        }
        unmet
    }

    /// Fill blank personal fields from the ID extraction. Values the applicant
    /// already entered are never overwritten.
    pub fn apply_id_extraction(&mut self, fields: &NormalizedFields, today: NaiveDate) {
        let personal = &mut self.personal;
        for (target, key) in [
            (&mut personal.first_name, "first_name"),
            (&mut personal.middle_name, "middle_name"),
            (&mut personal.last_name, "last_name"),
            (&mut personal.date_of_birth, "date_of_birth"),
            (&mut personal.sex, "sex"),
            (&mut personal.address, "address"),
        ] {
            if target.trim().is_empty() {
                if let Some(value) = fields.text(key) {
                    *target = value;
                }
            }
        }

        if personal.age.is_none() {
            personal.age = fields
                .number("age")
                .filter(|age| (0.0..MAX_PLAUSIBLE_AGE).contains(age))
                .map(|age| age as u32)
                .or_else(|| {
                    parse_birth_date(&personal.date_of_birth).and_then(|birth| age_on(birth, today))
                });
        }
    }
}
