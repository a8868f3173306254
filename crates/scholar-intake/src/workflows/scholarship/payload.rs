//! Wire types shared by the intake client and the review service.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Whether an applicant is entering the program or renewing an existing grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationType {
    New,
    Renewal,
}

impl ApplicationType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Renewal => "RENEWAL",
        }
    }
}

/// The three documents processed by the intake pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Government or school identification card.
    Id,
    /// Certificate of grades.
    Cog,
    /// Certificate of registration.
    Cor,
}

impl DocumentKind {
    pub const fn ordered() -> [Self; 3] {
        [Self::Id, Self::Cog, Self::Cor]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Cog => "cog",
            Self::Cor => "cor",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Id => "ID document",
            Self::Cog => "Certificate of Grades",
            Self::Cor => "Certificate of Registration",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Applicant details captured across the two personal-information stages.
///
/// Empty strings mean "not provided"; required-field rules live in
/// [`super::validation`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonalInfo {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub suffix: String,
    pub date_of_birth: String,
    pub age: Option<u32>,
    pub sex: String,
    pub civil_status: String,
    pub address: String,
    pub contact_number: String,
    pub email: String,
    pub school_name: String,
    pub course: String,
    pub year_level: String,
    pub student_number: String,
    pub father_name: String,
    pub mother_name: String,
    pub guardian_name: String,
    pub guardian_contact: String,
    pub annual_family_income: String,
}

impl PersonalInfo {
    pub fn full_name(&self) -> String {
        [
            self.first_name.as_str(),
            self.middle_name.as_str(),
            self.last_name.as_str(),
            self.suffix.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// A file carried inline as base64 so the payload has no client-local handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: String,
}

impl EncodedFile {
    pub fn from_bytes(file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        Self {
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.data.as_bytes())
    }

    pub fn is_empty(&self) -> bool {
        self.data.trim().is_empty()
    }
}

/// OCR and extraction output for one processed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPayload {
    pub kind: DocumentKind,
    pub file: EncodedFile,
    pub ocr_text: String,
    pub extracted_data: Option<Map<String, Value>>,
    pub accuracy: Option<f32>,
}

/// Per-document entries of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSet {
    pub id: DocumentPayload,
    pub cog: DocumentPayload,
    pub cor: DocumentPayload,
}

impl DocumentSet {
    pub fn iter(&self) -> impl Iterator<Item = &DocumentPayload> {
        [&self.id, &self.cog, &self.cor].into_iter()
    }
}

/// Face verification outcome as transported to the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceMatchSummary {
    pub distance: f32,
    pub is_match: bool,
}

/// The atomic submission produced by the intake wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub user_id: String,
    pub period_id: String,
    pub application_type: ApplicationType,
    pub personal_info: PersonalInfo,
    pub id_image: EncodedFile,
    pub face_image: EncodedFile,
    pub face_match: FaceMatchSummary,
    pub documents: DocumentSet,
}
