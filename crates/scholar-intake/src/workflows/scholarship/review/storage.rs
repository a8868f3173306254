use chrono::{DateTime, Utc};

use super::domain::ApplicationId;

/// Blob store for application images and certificate files.
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`, returning a reference usable by reviewers.
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object storage rejected '{key}': {reason}")]
    Rejected { key: String, reason: String },
    #[error("object storage unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoragePurpose {
    IdImage,
    FaceImage,
    Grades,
    Registration,
}

impl StoragePurpose {
    pub const fn label(self) -> &'static str {
        match self {
            Self::IdImage => "id",
            Self::FaceImage => "face",
            Self::Grades => "cog",
            Self::Registration => "cor",
        }
    }
}

/// `applications/{user}/{application}/{purpose}-{millis}.{ext}`.
///
/// Images are always stored as `.jpg`; certificates keep an extension
/// matching their content type.
pub fn object_key(
    user_id: &str,
    application_id: &ApplicationId,
    purpose: StoragePurpose,
    content_type: &str,
    at: DateTime<Utc>,
) -> String {
    let extension = match purpose {
        StoragePurpose::IdImage | StoragePurpose::FaceImage => "jpg",
        StoragePurpose::Grades | StoragePurpose::Registration => {
            extension_for(content_type).unwrap_or("jpg")
        }
    };

    format!(
        "applications/{user_id}/{application_id}/{}-{}.{extension}",
        purpose.label(),
        at.timestamp_millis()
    )
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    if content_type.trim().eq_ignore_ascii_case("application/pdf") {
        return Some("pdf");
    }
    if content_type.trim().eq_ignore_ascii_case("image/jpeg") {
        return Some("jpg");
    }

    mime_guess::get_mime_extensions_str(content_type.trim())
        .and_then(|extensions| extensions.first().copied())
}
