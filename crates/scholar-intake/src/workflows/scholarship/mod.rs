//! Scholarship application workflow: the applicant-facing intake pipeline and
//! the server-side submission and review service share the payload contract
//! and validation rules defined here.

pub mod intake;
pub mod payload;
pub mod review;
pub mod validation;

pub use payload::{
    ApplicationType, DocumentKind, DocumentPayload, DocumentSet, EncodedFile, FaceMatchSummary,
    PersonalInfo, SubmissionPayload,
};
pub use validation::{
    missing_fields, validate_payload, DraftValidationError, PersonalSection, RequiredField,
    Requirement,
};
