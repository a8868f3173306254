use serde::Serialize;
use tracing::debug;

use crate::workflows::scholarship::payload::{ApplicationType, DocumentKind, PersonalInfo};
use crate::workflows::scholarship::validation::DraftValidationError;

use super::draft::ApplicationDraft;
use super::face::FaceCapture;
use super::file::UploadedFile;
use super::gate::{PendingUpload, UploadConfirmationGate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStage {
    IdUpload,
    FaceScan,
    PersonalInfo,
    PersonalInfoContinued,
    Documents,
}

impl IntakeStage {
    pub const fn ordered_for(application_type: ApplicationType) -> &'static [Self] {
        match application_type {
            ApplicationType::New => &[
                Self::IdUpload,
                Self::FaceScan,
                Self::PersonalInfo,
                Self::PersonalInfoContinued,
                Self::Documents,
            ],
            ApplicationType::Renewal => &[Self::IdUpload, Self::FaceScan, Self::Documents],
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::IdUpload => "ID upload",
            Self::FaceScan => "Face scan",
            Self::PersonalInfo => "Personal information",
            Self::PersonalInfoContinued => "Personal information (continued)",
            Self::Documents => "Documents",
        }
    }

    /// Document slots shown on this stage.
    pub const fn slots(self) -> &'static [DocumentKind] {
        match self {
            Self::IdUpload => &[DocumentKind::Id],
            Self::Documents => &[DocumentKind::Cog, DocumentKind::Cor],
            _ => &[],
        }
    }
}

impl std::fmt::Display for IntakeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("{stage} is not complete: {source}")]
    Incomplete {
        stage: IntakeStage,
        source: DraftValidationError,
    },
    #[error("already at the first stage")]
    AtFirstStage,
    #[error("already at the last stage")]
    AtLastStage,
    #[error("{slot} cannot be uploaded during {stage}")]
    SlotNotOnStage {
        slot: DocumentKind,
        stage: IntakeStage,
    },
    #[error("'{name}' is not an image or PDF")]
    UnsupportedFile { name: String },
    #[error("no file is waiting for confirmation")]
    NoPendingUpload,
}

/// Ordered stages over one draft. Forward navigation only when the active
/// stage's requirements hold; backward navigation is always allowed.
#[derive(Debug)]
pub struct StageController {
    stages: &'static [IntakeStage],
    position: usize,
    draft: ApplicationDraft,
    gate: UploadConfirmationGate,
}

impl StageController {
    pub fn new(application_type: ApplicationType) -> Self {
        Self {
            stages: IntakeStage::ordered_for(application_type),
            position: 0,
            draft: ApplicationDraft::new(application_type),
            gate: UploadConfirmationGate::default(),
        }
    }

    pub fn stages(&self) -> &'static [IntakeStage] {
        self.stages
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current_stage(&self) -> IntakeStage {
        self.stages[self.position]
    }

    pub fn is_last_stage(&self) -> bool {
        self.position + 1 == self.stages.len()
    }

    pub fn draft(&self) -> &ApplicationDraft {
        &self.draft
    }

    pub(crate) fn draft_mut(&mut self) -> &mut ApplicationDraft {
        &mut self.draft
    }

    pub fn can_advance(&self, index: usize) -> bool {
        self.stages
            .get(index)
            .is_some_and(|stage| self.draft.unmet_requirements(*stage).is_empty())
    }

    pub fn advance(&mut self) -> Result<IntakeStage, StageError> {
        let stage = self.current_stage();
        DraftValidationError::check(self.draft.unmet_requirements(stage))
            .map_err(|source| StageError::Incomplete { stage, source })?;

        if self.is_last_stage() {
            return Err(StageError::AtLastStage);
        }

        self.position += 1;
        debug!(from = stage.label(), to = self.current_stage().label(), "stage advanced");
        Ok(self.current_stage())
    }

    pub fn retreat(&mut self) -> Result<IntakeStage, StageError> {
        if self.position == 0 {
            return Err(StageError::AtFirstStage);
        }

        self.position -= 1;
        Ok(self.current_stage())
    }

    /// Hold a selection for confirmation; nothing in the draft changes yet.
    pub fn drop_file(&mut self, slot: DocumentKind, file: UploadedFile) -> Result<(), StageError> {
        let stage = self.current_stage();
        if !stage.slots().contains(&slot) {
            return Err(StageError::SlotNotOnStage { slot, stage });
        }
        if !file.is_supported() {
            return Err(StageError::UnsupportedFile { name: file.name });
        }

        self.gate.on_file_dropped(slot, file);
        Ok(())
    }

    pub fn pending_upload(&self) -> Option<&PendingUpload> {
        self.gate.pending()
    }

    pub fn confirm_upload(&mut self) -> Result<DocumentKind, StageError> {
        let PendingUpload { slot, file } = self.gate.on_confirm().ok_or(StageError::NoPendingUpload)?;
        debug!(slot = slot.code(), file = %file.name, "upload confirmed");
        if slot == DocumentKind::Id && self.id_replaced_by(&file) {
            debug!("ID image replaced; discarding face match");
            self.clear_face();
        }
        self.draft.slot_mut(slot).commit(file);
        Ok(slot)
    }

    pub fn cancel_upload(&mut self) {
        self.gate.on_cancel();
    }

    fn id_replaced_by(&self, file: &UploadedFile) -> bool {
        self.draft
            .slot(DocumentKind::Id)
            .file()
            .map_or(true, |current| current.bytes != file.bytes)
    }

    pub fn update_personal(&mut self, update: impl FnOnce(&mut PersonalInfo)) {
        update(&mut self.draft.personal);
    }

    pub fn set_face(&mut self, capture: FaceCapture) {
        self.draft.face = Some(capture);
    }

    pub fn clear_face(&mut self) {
        self.draft.face = None;
    }
}
