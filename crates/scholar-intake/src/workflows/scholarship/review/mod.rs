//! Server side of the scholarship workflow: submission persistence and the
//! review state machine.

pub mod cleanup;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod state;
pub mod storage;

#[cfg(test)]
mod tests;

pub use cleanup::clean_ocr_text;
pub use domain::{
    ApplicationDocuments, ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationView,
    CertificateOfGrades, CertificateOfRegistration, CleanedText, OcrRecord, SubmissionBundle,
};
pub use repository::{ApplicationRepository, RepositoryError};
pub use router::application_router;
pub use service::{ApplicationService, ApplicationServiceError};
pub use state::{apply_transition, IllegalTransition};
pub use storage::{object_key, ObjectStorage, StorageError, StoragePurpose};
