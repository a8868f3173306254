use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::workflows::scholarship::payload::{
    ApplicationType, DocumentKind, DocumentPayload, DocumentSet, EncodedFile, FaceMatchSummary,
    PersonalInfo, SubmissionPayload,
};
use crate::workflows::scholarship::review::domain::{
    ApplicationDocuments, ApplicationId, ApplicationRecord, ApplicationStatus, SubmissionBundle,
};
use crate::workflows::scholarship::review::repository::{ApplicationRepository, RepositoryError};
use crate::workflows::scholarship::review::service::ApplicationService;
use crate::workflows::scholarship::review::storage::{ObjectStorage, StorageError};
use crate::workflows::scholarship::review::application_router;

pub(super) fn personal_info() -> PersonalInfo {
    PersonalInfo {
        first_name: "Juan".to_string(),
        last_name: "Dela Cruz".to_string(),
        date_of_birth: "01/15/2000".to_string(),
        age: Some(25),
        sex: "Male".to_string(),
        address: "Quezon City".to_string(),
        contact_number: "09171234567".to_string(),
        school_name: "Polytechnic University of the Philippines".to_string(),
        course: "BS Computer Science".to_string(),
        year_level: "3".to_string(),
        student_number: "2022-00123-MN-0".to_string(),
        guardian_name: "Maria Dela Cruz".to_string(),
        guardian_contact: "09179876543".to_string(),
        ..PersonalInfo::default()
    }
}

fn document(kind: DocumentKind, text: &str, extracted: Option<Value>) -> DocumentPayload {
    let (name, content_type) = match kind {
        DocumentKind::Id => ("id.jpg", "image/jpeg"),
        DocumentKind::Cog => ("grades.pdf", "application/pdf"),
        DocumentKind::Cor => ("registration.png", "image/png"),
    };

    DocumentPayload {
        kind,
        file: EncodedFile::from_bytes(name, content_type, text.as_bytes()),
        ocr_text: text.to_string(),
        extracted_data: extracted.and_then(|value| value.as_object().cloned()),
        accuracy: Some(0.85),
    }
}

pub(super) fn submission() -> SubmissionPayload {
    SubmissionPayload {
        user_id: "user-42".to_string(),
        period_id: "2025-1st".to_string(),
        application_type: ApplicationType::New,
        personal_info: personal_info(),
        id_image: EncodedFile::from_bytes("id.jpg", "image/jpeg", &[0xff, 0xd8, 0x01]),
        face_image: EncodedFile::from_bytes("face.jpg", "image/jpeg", &[0xff, 0xd8, 0x02]),
        face_match: FaceMatchSummary {
            distance: 0.31,
            is_match: true,
        },
        documents: DocumentSet {
            id: document(
                DocumentKind::Id,
                "REPUBLIC OF THE PHILIPPINES\n  JUAN   DELA CRUZ",
                Some(json!({ "first_name": "Juan", "last_name": "Dela Cruz" })),
            ),
            cog: document(
                DocumentKind::Cog,
                "CERTIFICATE OF GRADES GWA 1.75",
                Some(json!({
                    "student_name": "Juan Dela Cruz",
                    "gwa": 1.75,
                    "subjects": [{ "code": "CS101", "grade": "1.5" }],
                })),
            ),
            cor: document(DocumentKind::Cor, "CERTIFICATE OF REGISTRATION", None),
        },
    }
}

pub(super) fn build_service() -> (
    ApplicationService<MemoryRepository, MemoryStorage>,
    Arc<MemoryRepository>,
    Arc<MemoryStorage>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let storage = Arc::new(MemoryStorage::default());
    let service = ApplicationService::new(repository.clone(), storage.clone());
    (service, repository, storage)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
    pub(super) documents: Arc<Mutex<HashMap<ApplicationId, ApplicationDocuments>>>,
}

impl ApplicationRepository for MemoryRepository {
    fn insert_bundle(&self, bundle: SubmissionBundle) -> Result<ApplicationRecord, RepositoryError> {
        let mut records = self.records.lock().expect("repository mutex poisoned");
        let id = bundle.application.id;
        if records.contains_key(&id) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(id, bundle.application.clone());
        self.documents
            .lock()
            .expect("repository mutex poisoned")
            .insert(
                id,
                ApplicationDocuments {
                    ocr_records: bundle.ocr_records,
                    cleaned_texts: bundle.cleaned_texts,
                    grades: bundle.grades,
                    registration: bundle.registration,
                },
            );
        Ok(bundle.application)
    }

    fn update_status(
        &self,
        id: &ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut records = self.records.lock().expect("repository mutex poisoned");
        let record = records.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if record.status != expected {
            return Err(RepositoryError::StatusChanged {
                current: record.status,
            });
        }
        record.status = next;
        record.updated_at = updated_at;
        Ok(record.clone())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let records = self.records.lock().expect("repository mutex poisoned");
        Ok(records.get(id).cloned())
    }

    fn by_status(
        &self,
        status: ApplicationStatus,
        limit: usize,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let records = self.records.lock().expect("repository mutex poisoned");
        let mut matching: Vec<_> = records
            .values()
            .filter(|record| record.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.created_at);
        matching.truncate(limit);
        Ok(matching)
    }

    fn documents(&self, id: &ApplicationId) -> Result<ApplicationDocuments, RepositoryError> {
        let documents = self.documents.lock().expect("repository mutex poisoned");
        Ok(documents.get(id).cloned().unwrap_or_default())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryStorage {
    pub(super) objects: Arc<Mutex<HashMap<String, (Vec<u8>, String)>>>,
}

impl MemoryStorage {
    pub(super) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .objects
            .lock()
            .expect("storage mutex poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl ObjectStorage for MemoryStorage {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        self.objects
            .lock()
            .expect("storage mutex poisoned")
            .insert(key.to_string(), (bytes.to_vec(), content_type.to_string()));
        Ok(format!("memory://{key}"))
    }
}

pub(super) struct OfflineStorage;

impl ObjectStorage for OfflineStorage {
    fn put(&self, _key: &str, _bytes: &[u8], _content_type: &str) -> Result<String, StorageError> {
        Err(StorageError::Unavailable("bucket offline".to_string()))
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert_bundle(&self, _bundle: SubmissionBundle) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_status(
        &self,
        _id: &ApplicationId,
        _expected: ApplicationStatus,
        _next: ApplicationStatus,
        _updated_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn by_status(
        &self,
        _status: ApplicationStatus,
        _limit: usize,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn documents(&self, _id: &ApplicationId) -> Result<ApplicationDocuments, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Fetch succeeds from a seeded record, but writes fail.
pub(super) struct ReadOnlyRepository {
    pub(super) record: ApplicationRecord,
}

impl ApplicationRepository for ReadOnlyRepository {
    fn insert_bundle(&self, _bundle: SubmissionBundle) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn update_status(
        &self,
        _id: &ApplicationId,
        _expected: ApplicationStatus,
        _next: ApplicationStatus,
        _updated_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Ok((self.record.id == *id).then(|| self.record.clone()))
    }

    fn by_status(
        &self,
        _status: ApplicationStatus,
        _limit: usize,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Ok(Vec::new())
    }

    fn documents(&self, _id: &ApplicationId) -> Result<ApplicationDocuments, RepositoryError> {
        Ok(ApplicationDocuments::default())
    }
}

/// Holds the first two reads at a barrier so both callers see the same status
/// before either one writes.
pub(super) struct RacingRepository {
    inner: MemoryRepository,
    barrier: Barrier,
    reads: AtomicUsize,
}

impl RacingRepository {
    pub(super) fn new(inner: MemoryRepository) -> Self {
        Self {
            inner,
            barrier: Barrier::new(2),
            reads: AtomicUsize::new(0),
        }
    }
}

impl ApplicationRepository for RacingRepository {
    fn insert_bundle(&self, bundle: SubmissionBundle) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert_bundle(bundle)
    }

    fn update_status(
        &self,
        id: &ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.update_status(id, expected, next, updated_at)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let record = self.inner.fetch(id);
        if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait();
        }
        record
    }

    fn by_status(
        &self,
        status: ApplicationStatus,
        limit: usize,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.by_status(status, limit)
    }

    fn documents(&self, id: &ApplicationId) -> Result<ApplicationDocuments, RepositoryError> {
        self.inner.documents(id)
    }
}

pub(super) fn extracted(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("object literal")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn application_router_with_service(
    service: ApplicationService<MemoryRepository, MemoryStorage>,
) -> axum::Router {
    application_router(Arc::new(service))
}
