use crate::workflows::scholarship::payload::DocumentKind;

use super::file::UploadedFile;

/// A selected file waiting for the applicant to confirm it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub slot: DocumentKind,
    pub file: UploadedFile,
}

/// Holds at most one unconfirmed selection. Nothing reaches a slot without
/// passing through [`UploadConfirmationGate::on_confirm`].
#[derive(Debug, Default)]
pub struct UploadConfirmationGate {
    pending: Option<PendingUpload>,
}

impl UploadConfirmationGate {
    /// A new drop replaces any earlier unconfirmed selection.
    pub fn on_file_dropped(&mut self, slot: DocumentKind, file: UploadedFile) {
        self.pending = Some(PendingUpload { slot, file });
    }

    pub fn pending(&self) -> Option<&PendingUpload> {
        self.pending.as_ref()
    }

    pub fn on_confirm(&mut self) -> Option<PendingUpload> {
        self.pending.take()
    }

    pub fn on_cancel(&mut self) -> Option<PendingUpload> {
        self.pending.take()
    }
}
