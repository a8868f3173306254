use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use scholar_intake::workflows::scholarship::review::{
    ApplicationDocuments, ApplicationId, ApplicationRecord, ApplicationRepository,
    ApplicationStatus, ObjectStorage, RepositoryError, StorageError, SubmissionBundle,
};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
    documents: Arc<Mutex<HashMap<ApplicationId, ApplicationDocuments>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert_bundle(&self, bundle: SubmissionBundle) -> Result<ApplicationRecord, RepositoryError> {
        let mut records = self.records.lock().expect("repository mutex poisoned");
        let id = bundle.application.id;
        if records.contains_key(&id) {
            return Err(RepositoryError::Conflict);
        }
        records.insert(id, bundle.application.clone());

        let mut documents = self.documents.lock().expect("repository mutex poisoned");
        documents.insert(
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
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn by_status(
        &self,
        status: ApplicationStatus,
        limit: usize,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut matching: Vec<_> = guard
            .values()
            .filter(|record| record.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.created_at);
        matching.truncate(limit);
        Ok(matching)
    }

    fn documents(&self, id: &ApplicationId) -> Result<ApplicationDocuments, RepositoryError> {
        let guard = self.documents.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned().unwrap_or_default())
    }
}

/// Keeps uploaded objects in process memory, addressed as `memory://{key}`.
#[derive(Default, Clone)]
pub(crate) struct InMemoryObjectStorage {
    objects: Arc<Mutex<HashMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
pub(crate) struct StoredObject {
    pub(crate) content_type: String,
    pub(crate) size: usize,
}

impl ObjectStorage for InMemoryObjectStorage {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        if key.trim().is_empty() {
            return Err(StorageError::Rejected {
                key: key.to_string(),
                reason: "empty key".to_string(),
            });
        }

        let mut guard = self.objects.lock().expect("storage mutex poisoned");
        guard.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                size: bytes.len(),
            },
        );
        Ok(format!("memory://{key}"))
    }
}

impl InMemoryObjectStorage {
    pub(crate) fn objects(&self) -> Vec<(String, StoredObject)> {
        let guard = self.objects.lock().expect("storage mutex poisoned");
        let mut objects: Vec<_> = guard
            .iter()
            .map(|(key, object)| (key.clone(), object.clone()))
            .collect();
        objects.sort_by(|left, right| left.0.cmp(&right.0));
        objects
    }
}
