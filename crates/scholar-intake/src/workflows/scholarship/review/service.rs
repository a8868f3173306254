use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::workflows::scholarship::payload::{DocumentPayload, EncodedFile, SubmissionPayload};
use crate::workflows::scholarship::validation::{validate_payload, DraftValidationError};

use super::cleanup::clean_ocr_text;
use super::domain::{
    ApplicationDocuments, ApplicationId, ApplicationRecord, ApplicationStatus,
    CertificateOfGrades, CertificateOfRegistration, CleanedText, OcrRecord, SubmissionBundle,
};
use super::repository::{ApplicationRepository, RepositoryError};
use super::state::{apply_transition, IllegalTransition};
use super::storage::{object_key, ObjectStorage, StoragePurpose};

/// Largest page a reviewer listing returns.
pub const MAX_LIST_LIMIT: usize = 200;

/// Service composing the repository, object storage, and review state machine.
pub struct ApplicationService<R, S> {
    repository: Arc<R>,
    storage: Arc<S>,
}

impl<R, S> ApplicationService<R, S>
where
    R: ApplicationRepository + 'static,
    S: ObjectStorage + 'static,
{
    pub fn new(repository: Arc<R>, storage: Arc<S>) -> Self {
        Self {
            repository,
            storage,
        }
    }

    /// Persist a submission and its document records as a new `PENDING` application.
    ///
    /// Image storage failures degrade to empty references; the application is
    /// still created so the applicant does not have to start over.
    pub fn submit(
        &self,
        payload: SubmissionPayload,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        validate_payload(&payload)?;

        let id = ApplicationId::new();
        let now = Utc::now();
        let user_id = payload.user_id.as_str();

        let id_image_ref =
            self.store_image(user_id, &id, StoragePurpose::IdImage, &payload.id_image, now);
        let face_image_ref =
            self.store_image(user_id, &id, StoragePurpose::FaceImage, &payload.face_image, now);
        let grades_ref = self.store_certificate(
            user_id,
            &id,
            StoragePurpose::Grades,
            &payload.documents.cog.file,
            now,
        );
        let registration_ref = self.store_certificate(
            user_id,
            &id,
            StoragePurpose::Registration,
            &payload.documents.cor.file,
            now,
        );

        let mut ocr_records = Vec::new();
        let mut cleaned_texts = Vec::new();
        for document in payload.documents.iter() {
            let (record, cleaned) = ocr_entries(&id, document, now);
            ocr_records.push(record);
            cleaned_texts.extend(cleaned);
        }

        let grades = payload
            .documents
            .cog
            .extracted_data
            .as_ref()
            .map(|data| CertificateOfGrades::from_extracted(id, data, grades_ref));
        let registration = payload
            .documents
            .cor
            .extracted_data
            .as_ref()
            .map(|data| CertificateOfRegistration::from_extracted(id, data, registration_ref));

        let application = ApplicationRecord {
            id,
            user_id: payload.user_id.clone(),
            period_id: payload.period_id.clone(),
            status: ApplicationStatus::Pending,
            application_type: payload.application_type,
            details: payload.personal_info,
            id_image_ref,
            face_image_ref,
            face_match: payload.face_match,
            created_at: now,
            updated_at: now,
        };

        let stored = self.repository.insert_bundle(SubmissionBundle {
            application,
            ocr_records,
            cleaned_texts,
            grades,
            registration,
        })?;

        info!(
            application_id = %stored.id,
            user_id = %stored.user_id,
            application_type = stored.application_type.label(),
            "scholarship application submitted"
        );
        Ok(stored)
    }

    /// Request a status change; only the review state machine decides whether it is legal.
    ///
    /// The write is conditional on the status that was read. When another decision
    /// lands first the request is re-evaluated against the new status, so it either
    /// applies on top of it or fails as an illegal transition.
    pub fn transition(
        &self,
        id: &ApplicationId,
        next: ApplicationStatus,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        // Statuses only move forward, so a legitimate race settles within this many reads.
        for _ in 0..ApplicationStatus::ordered().len() {
            let mut record = self.get(id)?;
            let previous = record.status;
            apply_transition(&mut record, next, Utc::now())?;

            match self
                .repository
                .update_status(id, previous, next, record.updated_at)
            {
                Ok(stored) => {
                    info!(
                        application_id = %id,
                        from = previous.label(),
                        to = next.label(),
                        "application status changed"
                    );
                    return Ok(stored);
                }
                Err(RepositoryError::StatusChanged { current }) => {
                    debug!(
                        application_id = %id,
                        expected = previous.label(),
                        current = current.label(),
                        "status changed concurrently; re-evaluating"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepositoryError::Unavailable(format!("status of {id} kept changing")).into())
    }

    pub fn get(&self, id: &ApplicationId) -> Result<ApplicationRecord, ApplicationServiceError> {
        let record = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn list(
        &self,
        status: ApplicationStatus,
        limit: usize,
    ) -> Result<Vec<ApplicationRecord>, ApplicationServiceError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        Ok(self.repository.by_status(status, limit)?)
    }

    pub fn documents(
        &self,
        id: &ApplicationId,
    ) -> Result<ApplicationDocuments, ApplicationServiceError> {
        self.get(id)?;
        Ok(self.repository.documents(id)?)
    }

    fn store_image(
        &self,
        user_id: &str,
        id: &ApplicationId,
        purpose: StoragePurpose,
        file: &EncodedFile,
        now: DateTime<Utc>,
    ) -> String {
        match self.store(user_id, id, purpose, file, now) {
            Ok(reference) => reference,
            Err(reason) => {
                warn!(application_id = %id, purpose = purpose.label(), %reason, "image not stored");
                String::new()
            }
        }
    }

    fn store_certificate(
        &self,
        user_id: &str,
        id: &ApplicationId,
        purpose: StoragePurpose,
        file: &EncodedFile,
        now: DateTime<Utc>,
    ) -> String {
        match self.store(user_id, id, purpose, file, now) {
            Ok(reference) => reference,
            Err(reason) => {
                error!(
                    application_id = %id,
                    purpose = purpose.label(),
                    %reason,
                    "certificate file not stored"
                );
                String::new()
            }
        }
    }

    fn store(
        &self,
        user_id: &str,
        id: &ApplicationId,
        purpose: StoragePurpose,
        file: &EncodedFile,
        now: DateTime<Utc>,
    ) -> Result<String, String> {
        let bytes = file.decode().map_err(|err| format!("invalid base64: {err}"))?;
        let key = object_key(user_id, id, purpose, &file.content_type, now);
        self.storage
            .put(&key, &bytes, &file.content_type)
            .map_err(|err| err.to_string())
    }
}

fn ocr_entries(
    id: &ApplicationId,
    document: &DocumentPayload,
    now: DateTime<Utc>,
) -> (OcrRecord, Option<CleanedText>) {
    let record = OcrRecord {
        id: Uuid::new_v4(),
        application_id: *id,
        file_type: document.kind,
        raw_text: document.ocr_text.clone(),
        created_at: now,
    };

    let text = clean_ocr_text(&document.ocr_text);
    let cleaned = (!text.is_empty()).then(|| CleanedText {
        ocr_record_id: record.id,
        text,
        accuracy: document.accuracy,
    });

    (record, cleaned)
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Validation(#[from] DraftValidationError),
    #[error(transparent)]
    Transition(#[from] IllegalTransition),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
