use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::workflows::scholarship::payload::{
    ApplicationType, DocumentKind, FaceMatchSummary, PersonalInfo,
};

/// Identifier minted for an application at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ApplicationId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Review lifecycle of a persisted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Pending,
            Self::UnderReview,
            Self::Approved,
            Self::Rejected,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::UnderReview => "UNDER_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_uppercase();
        Self::ordered()
            .into_iter()
            .find(|status| status.label() == normalized)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The persisted application row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub user_id: String,
    pub period_id: String,
    pub status: ApplicationStatus,
    pub application_type: ApplicationType,
    pub details: PersonalInfo,
    pub id_image_ref: String,
    pub face_image_ref: String,
    pub face_match: FaceMatchSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id,
            user_id: self.user_id.clone(),
            period_id: self.period_id.clone(),
            status: self.status.label(),
            application_type: self.application_type,
            full_name: self.details.full_name(),
            face_match: self.face_match,
            id_image_ref: self.id_image_ref.clone(),
            face_image_ref: self.face_image_ref.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Sanitized representation returned by the HTTP surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub user_id: String,
    pub period_id: String,
    pub status: &'static str,
    #[serde(rename = "type")]
    pub application_type: ApplicationType,
    pub full_name: String,
    pub face_match: FaceMatchSummary,
    pub id_image_ref: String,
    pub face_image_ref: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw OCR output for one processed document. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRecord {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub file_type: DocumentKind,
    pub raw_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanedText {
    pub ocr_record_id: Uuid,
    pub text: String,
    pub accuracy: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateOfGrades {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub student_name: Option<String>,
    pub school: Option<String>,
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub gwa: Option<f64>,
    pub subjects: Vec<Value>,
    pub file_ref: String,
    pub extracted: Map<String, Value>,
}

impl CertificateOfGrades {
    pub fn from_extracted(
        application_id: ApplicationId,
        extracted: &Map<String, Value>,
        file_ref: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_id,
            student_name: text_field(extracted, "student_name"),
            school: text_field(extracted, "school"),
            school_year: text_field(extracted, "school_year"),
            semester: text_field(extracted, "semester"),
            gwa: number_field(extracted, "gwa"),
            subjects: list_field(extracted, "subjects"),
            file_ref,
            extracted: extracted.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateOfRegistration {
    pub id: Uuid,
    pub application_id: ApplicationId,
    pub student_name: Option<String>,
    pub student_number: Option<String>,
    pub school: Option<String>,
    pub course: Option<String>,
    pub year_level: Option<String>,
    pub school_year: Option<String>,
    pub semester: Option<String>,
    pub total_units: Option<f64>,
    pub subjects: Vec<Value>,
    pub file_ref: String,
    pub extracted: Map<String, Value>,
}

impl CertificateOfRegistration {
    pub fn from_extracted(
        application_id: ApplicationId,
        extracted: &Map<String, Value>,
        file_ref: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            application_id,
            student_name: text_field(extracted, "student_name"),
            student_number: text_field(extracted, "student_number"),
            school: text_field(extracted, "school"),
            course: text_field(extracted, "course"),
            year_level: text_field(extracted, "year_level"),
            school_year: text_field(extracted, "school_year"),
            semester: text_field(extracted, "semester"),
            total_units: number_field(extracted, "total_units"),
            subjects: list_field(extracted, "subjects"),
            file_ref,
            extracted: extracted.clone(),
        }
    }
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn list_field(map: &Map<String, Value>, key: &str) -> Vec<Value> {
    match map.get(key) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Everything created by one submission, persisted in a single repository call.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionBundle {
    pub application: ApplicationRecord,
    pub ocr_records: Vec<OcrRecord>,
    pub cleaned_texts: Vec<CleanedText>,
    pub grades: Option<CertificateOfGrades>,
    pub registration: Option<CertificateOfRegistration>,
}

/// Document records attached to an application, for reviewers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDocuments {
    pub ocr_records: Vec<OcrRecord>,
    pub cleaned_texts: Vec<CleanedText>,
    pub grades: Option<CertificateOfGrades>,
    pub registration: Option<CertificateOfRegistration>,
}
