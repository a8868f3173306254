use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationDocuments, ApplicationId, ApplicationRecord, ApplicationStatus, SubmissionBundle,
};

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    /// Persist an application and all of its document records together.
    fn insert_bundle(&self, bundle: SubmissionBundle) -> Result<ApplicationRecord, RepositoryError>;
    /// Move `id` from `expected` to `next` atomically. Fails with
    /// [`RepositoryError::StatusChanged`] when the stored status is no longer `expected`.
    fn update_status(
        &self,
        id: &ApplicationId,
        expected: ApplicationStatus,
        next: ApplicationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<ApplicationRecord, RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn by_status(
        &self,
        status: ApplicationStatus,
        limit: usize,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn documents(&self, id: &ApplicationId) -> Result<ApplicationDocuments, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("status changed to {current} since it was read")]
    StatusChanged { current: ApplicationStatus },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
