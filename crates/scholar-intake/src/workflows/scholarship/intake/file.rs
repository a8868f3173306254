use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::workflows::scholarship::payload::EncodedFile;

/// A file the applicant selected, held in memory for the wizard session.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Images of any subtype and PDFs are accepted for recognition.
    pub fn is_supported(&self) -> bool {
        match self.content_type.parse::<mime::Mime>() {
            Ok(parsed) => {
                parsed.type_() == mime::IMAGE || parsed.essence_str() == mime::APPLICATION_PDF
            }
            Err(_) => false,
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.content_type
            .parse::<mime::Mime>()
            .map(|parsed| parsed.essence_str() == mime::APPLICATION_PDF)
            .unwrap_or(false)
    }

    /// SHA-256 of the file bytes, base64 encoded.
    pub fn digest(&self) -> String {
        STANDARD.encode(Sha256::digest(&self.bytes))
    }

    pub fn identity(&self, mode: GuardIdentity) -> FileIdentity {
        match mode {
            GuardIdentity::FileName => FileIdentity::Name(self.name.clone()),
            GuardIdentity::ContentDigest => FileIdentity::Digest(self.digest()),
        }
    }

    pub fn encode(&self) -> EncodedFile {
        EncodedFile::from_bytes(&self.name, &self.content_type, &self.bytes)
    }
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// How the re-processing guard decides whether a slot already saw a file.
///
/// `FileName` is the established behavior: a re-upload with the same name is
/// treated as the same document even if its bytes differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardIdentity {
    #[default]
    FileName,
    ContentDigest,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileIdentity {
    Name(String),
    Digest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_images_and_pdfs_only() {
        let jpeg = UploadedFile::new("id.jpg", "image/jpeg", vec![1]);
        let pdf = UploadedFile::new("cog.pdf", "application/pdf", vec![1]);
        let doc = UploadedFile::new("cor.docx", "application/msword", vec![1]);
        let junk = UploadedFile::new("x", "not a mime", vec![1]);

        assert!(jpeg.is_supported());
        assert!(pdf.is_supported() && pdf.is_pdf());
        assert!(!doc.is_supported());
        assert!(!junk.is_supported());
    }

    #[test]
    fn name_identity_ignores_content_but_digest_does_not() {
        let first = UploadedFile::new("grades.pdf", "application/pdf", b"v1".to_vec());
        let second = UploadedFile::new("grades.pdf", "application/pdf", b"v2".to_vec());

        assert_eq!(
            first.identity(GuardIdentity::FileName),
            second.identity(GuardIdentity::FileName)
        );
        assert_ne!(
            first.identity(GuardIdentity::ContentDigest),
            second.identity(GuardIdentity::ContentDigest)
        );
    }
}
