//! Completeness rules shared by the wizard, the assembler, and the review service.
//!
//! The wizard's stage predicates and the server's submission check both resolve to
//! the same [`Requirement`] list, so a payload built outside the wizard cannot skip
//! a rule the wizard would have enforced.

use std::fmt;

use serde::Serialize;

use super::payload::{DocumentKind, PersonalInfo, SubmissionPayload};

/// Which of the two personal-information stages a field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalSection {
    Identity,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    FirstName,
    LastName,
    DateOfBirth,
    Sex,
    Address,
    ContactNumber,
    SchoolName,
    Course,
    YearLevel,
    StudentNumber,
    GuardianName,
    GuardianContact,
}

impl RequiredField {
    pub const fn for_section(section: PersonalSection) -> &'static [Self] {
        match section {
            PersonalSection::Identity => &[
                Self::FirstName,
                Self::LastName,
                Self::DateOfBirth,
                Self::Sex,
                Self::Address,
                Self::ContactNumber,
            ],
            PersonalSection::Background => &[
                Self::SchoolName,
                Self::Course,
                Self::YearLevel,
                Self::StudentNumber,
                Self::GuardianName,
                Self::GuardianContact,
            ],
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FirstName => "first name",
            Self::LastName => "last name",
            Self::DateOfBirth => "date of birth",
            Self::Sex => "sex",
            Self::Address => "address",
            Self::ContactNumber => "contact number",
            Self::SchoolName => "school name",
            Self::Course => "course",
            Self::YearLevel => "year level",
            Self::StudentNumber => "student number",
            Self::GuardianName => "guardian name",
            Self::GuardianContact => "guardian contact",
        }
    }

    fn value(self, info: &PersonalInfo) -> &str {
        match self {
            Self::FirstName => &info.first_name,
            Self::LastName => &info.last_name,
            Self::DateOfBirth => &info.date_of_birth,
            Self::Sex => &info.sex,
            Self::Address => &info.address,
            Self::ContactNumber => &info.contact_number,
            Self::SchoolName => &info.school_name,
            Self::Course => &info.course,
            Self::YearLevel => &info.year_level,
            Self::StudentNumber => &info.student_number,
            Self::GuardianName => &info.guardian_name,
            Self::GuardianContact => &info.guardian_contact,
        }
    }
}

/// A single unmet condition blocking a stage or a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "requirement", content = "subject", rename_all = "snake_case")]
pub enum Requirement {
    DocumentFile(DocumentKind),
    DocumentProcessed(DocumentKind),
    FaceMatch,
    Field(RequiredField),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::DocumentFile(kind) => write!(f, "{kind} must be uploaded"),
            Requirement::DocumentProcessed(kind) => {
                write!(f, "{kind} must finish processing")
            }
            Requirement::FaceMatch => write!(f, "face verification must succeed"),
            Requirement::Field(field) => write!(f, "{} is required", field.label()),
        }
    }
}

/// Raised when a draft or payload does not satisfy every requirement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("application incomplete: {}", join_requirements(.unmet))]
pub struct DraftValidationError {
    pub unmet: Vec<Requirement>,
}

fn join_requirements(unmet: &[Requirement]) -> String {
    unmet
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DraftValidationError {
    pub fn check(unmet: Vec<Requirement>) -> Result<(), Self> {
        if unmet.is_empty() {
            Ok(())
        } else {
            Err(Self { unmet })
        }
    }
}

/// Required fields of `section` that are blank in `info`.
pub fn missing_fields(section: PersonalSection, info: &PersonalInfo) -> Vec<Requirement> {
    RequiredField::for_section(section)
        .iter()
        .copied()
        .filter(|field| field.value(info).trim().is_empty())
        .map(Requirement::Field)
        .collect()
}

/// Server-side completeness check for a payload that arrived over the wire.
///
/// Renewal payloads skip the personal-information stages, so only new
/// applications are held to the personal field rules.
pub fn validate_payload(payload: &SubmissionPayload) -> Result<(), DraftValidationError> {
    let mut unmet = Vec::new();

    for document in payload.documents.iter() {
        if document.file.is_empty() {
            unmet.push(Requirement::DocumentFile(document.kind));
        }
    }

    if payload.id_image.is_empty() || payload.face_image.is_empty() || !payload.face_match.is_match
    {
        unmet.push(Requirement::FaceMatch);
    }

    if payload.application_type == super::payload::ApplicationType::New {
        unmet.extend(missing_fields(
            PersonalSection::Identity,
            &payload.personal_info,
        ));
        unmet.extend(missing_fields(
            PersonalSection::Background,
            &payload.personal_info,
        ));
    }

    DraftValidationError::check(unmet)
}
