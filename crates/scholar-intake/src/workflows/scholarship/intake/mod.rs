//! Client-side application intake: document capture, OCR, structured
//! extraction, face verification, and submission.
//!
//! [`IntakeWizard`] is the entry point. It owns a [`StageController`] over an
//! [`ApplicationDraft`] and borrows long-lived state from an [`IntakeSession`].

pub mod assembler;
pub mod controller;
mod dates;
pub mod draft;
pub mod extraction;
pub mod face;
pub mod file;
pub mod gate;
pub mod ocr;
pub mod processor;
pub mod session;
pub mod submit;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use assembler::assemble;
pub use controller::{IntakeStage, StageController, StageError};
pub use dates::{age_on, parse_birth_date};
pub use draft::{ApplicationDraft, ProcessedDocument, ProcessingOutcome, SlotState, SlotStatus};
pub use extraction::{
    ErrorCategory, ExtractionChannel, ExtractionError, NormalizedFields, RequestSigner,
    SharedSecretSigner, StructuredExtractor, StructuredExtractorClient,
};
pub use face::{
    Camera, CaptureError, FaceCapture, FaceDescriptor, FaceError, FaceMatchResult, FaceModels,
    FaceVerificationEngine, ModelLoader,
};
pub use file::{FileIdentity, GuardIdentity, UploadedFile};
pub use gate::{PendingUpload, UploadConfirmationGate};
pub use ocr::{OcrProgress, RecognitionOutcome, TextRecognizer};
pub use session::{CancelFlag, IntakeSession};
pub use submit::{HttpSubmissionClient, SubmissionError, SubmissionReceipt, SubmissionTransport};
pub use wizard::{IntakeError, IntakeWizard, WizardCollaborators};
