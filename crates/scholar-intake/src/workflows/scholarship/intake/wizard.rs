//! Single entry point a client drives through an application.

use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::workflows::scholarship::payload::{ApplicationType, DocumentKind, PersonalInfo};
use crate::workflows::scholarship::validation::DraftValidationError;

use super::assembler::assemble;
use super::controller::{IntakeStage, StageController, StageError};
use super::draft::{ApplicationDraft, SlotStatus};
use super::extraction::StructuredExtractor;
use super::face::{Camera, CaptureError, CaptureProtocol, FaceCapture, FaceError, FaceMatchResult};
use super::file::{GuardIdentity, UploadedFile};
use super::gate::PendingUpload;
use super::ocr::{OcrProgress, TextRecognizer};
use super::processor::{DocumentProcessor, SlotJob, SlotRun};
use super::session::IntakeSession;
use super::submit::{SubmissionError, SubmissionReceipt, SubmissionTransport};

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error("{0} has no confirmed file")]
    NoFile(DocumentKind),
    #[error("{0} has nothing to retry")]
    NothingToRetry(DocumentKind),
    #[error("the ID document must be uploaded before the face scan")]
    MissingIdImage,
    #[error(transparent)]
    Face(#[from] FaceError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Incomplete(#[from] DraftValidationError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("intake session was cancelled")]
    Cancelled,
}

/// External engines the wizard depends on.
#[derive(Clone)]
pub struct WizardCollaborators {
    pub recognizer: Arc<dyn TextRecognizer>,
    pub extractor: Arc<dyn StructuredExtractor>,
    pub camera: Arc<dyn Camera>,
    pub submitter: Arc<dyn SubmissionTransport>,
}

struct SlotProgress {
    id: watch::Sender<OcrProgress>,
    cog: watch::Sender<OcrProgress>,
    cor: watch::Sender<OcrProgress>,
}

impl SlotProgress {
    fn new() -> Self {
        Self {
            id: watch::Sender::new(OcrProgress::idle()),
            cog: watch::Sender::new(OcrProgress::idle()),
            cor: watch::Sender::new(OcrProgress::idle()),
        }
    }

    fn sender(&self, kind: DocumentKind) -> &watch::Sender<OcrProgress> {
        match kind {
            DocumentKind::Id => &self.id,
            DocumentKind::Cog => &self.cog,
            DocumentKind::Cor => &self.cor,
        }
    }
}

pub struct IntakeWizard {
    session: Arc<IntakeSession>,
    controller: StageController,
    processor: DocumentProcessor,
    camera: Arc<dyn Camera>,
    capture: CaptureProtocol,
    submitter: Arc<dyn SubmissionTransport>,
    guard: GuardIdentity,
    progress: SlotProgress,
    countdown: watch::Sender<Option<u32>>,
    today: fn() -> NaiveDate,
    receipt: Option<SubmissionReceipt>,
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl IntakeWizard {
    pub fn new(
        session: Arc<IntakeSession>,
        application_type: ApplicationType,
        collaborators: WizardCollaborators,
    ) -> Self {
        let WizardCollaborators {
            recognizer,
            extractor,
            camera,
            submitter,
        } = collaborators;

        Self {
            session,
            controller: StageController::new(application_type),
            processor: DocumentProcessor::new(recognizer, extractor),
            camera,
            capture: CaptureProtocol::default(),
            submitter,
            guard: GuardIdentity::default(),
            progress: SlotProgress::new(),
            countdown: watch::Sender::new(None),
            today: local_today,
            receipt: None,
        }
    }

    pub fn with_guard(mut self, guard: GuardIdentity) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_clock(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn session(&self) -> &Arc<IntakeSession> {
        &self.session
    }

    pub fn stage(&self) -> IntakeStage {
        self.controller.current_stage()
    }

    pub fn stages(&self) -> &'static [IntakeStage] {
        self.controller.stages()
    }

    pub fn draft(&self) -> &ApplicationDraft {
        self.controller.draft()
    }

    pub fn can_advance(&self) -> bool {
        self.controller.can_advance(self.controller.position())
    }

    pub fn advance(&mut self) -> Result<IntakeStage, IntakeError> {
        Ok(self.controller.advance()?)
    }

    pub fn retreat(&mut self) -> Result<IntakeStage, IntakeError> {
        Ok(self.controller.retreat()?)
    }

    pub fn progress_receiver(&self, kind: DocumentKind) -> watch::Receiver<OcrProgress> {
        self.progress.sender(kind).subscribe()
    }

    /// Seconds left on the face-capture countdown while it runs.
    pub fn countdown_receiver(&self) -> watch::Receiver<Option<u32>> {
        self.countdown.subscribe()
    }

    pub fn drop_file(&mut self, slot: DocumentKind, file: UploadedFile) -> Result<(), IntakeError> {
        Ok(self.controller.drop_file(slot, file)?)
    }

    pub fn pending_upload(&self) -> Option<&PendingUpload> {
        self.controller.pending_upload()
    }

    pub fn confirm_upload(&mut self) -> Result<DocumentKind, IntakeError> {
        let slot = self.controller.confirm_upload()?;
        self.publish_progress(slot);
        Ok(slot)
    }

    pub fn cancel_upload(&mut self) {
        self.controller.cancel_upload();
    }

    pub fn update_personal(&mut self, update: impl FnOnce(&mut PersonalInfo)) {
        self.controller.update_personal(update);
    }

    /// OCR and extract the ID, pre-filling personal information from it.
    pub async fn process_id_document(&mut self) -> Result<SlotStatus, IntakeError> {
        let mut statuses = self.process_slots(&[DocumentKind::Id]).await?;
        statuses.pop().map(|(_, status)| status).ok_or(IntakeError::NoFile(DocumentKind::Id))
    }

    /// Process both certificates concurrently.
    pub async fn process_documents(
        &mut self,
    ) -> Result<Vec<(DocumentKind, SlotStatus)>, IntakeError> {
        self.process_slots(&[DocumentKind::Cog, DocumentKind::Cor]).await
    }

    /// Run a slot again after a transient extraction failure.
    pub async fn retry_slot(&mut self, kind: DocumentKind) -> Result<SlotStatus, IntakeError> {
        if !matches!(
            self.draft().slot(kind).status(),
            SlotStatus::RetryNeeded { .. } | SlotStatus::AwaitingProcessing
        ) {
            return Err(IntakeError::NothingToRetry(kind));
        }

        let mut statuses = self.process_slots(&[kind]).await?;
        statuses.pop().map(|(_, status)| status).ok_or(IntakeError::NoFile(kind))
    }

    async fn process_slots(
        &mut self,
        kinds: &[DocumentKind],
    ) -> Result<Vec<(DocumentKind, SlotStatus)>, IntakeError> {
        self.ensure_active()?;

        let mut jobs = Vec::new();
        for kind in kinds {
            if let Some(job) = self.plan_job(*kind)? {
                jobs.push(job);
            }
        }

        let processor = &self.processor;
        let progress = &self.progress;
        let cancel = self.session.cancel_flag();
        let user_id = self.session.user_id();
        let runs = join_all(jobs.into_iter().map(|job| async move {
            let kind = job.kind;
            let run = processor
                .run(job, Some(user_id), cancel, progress.sender(kind))
                .await;
            (kind, run)
        }))
        .await;

        let mut cancelled = false;
        for (kind, run) in runs {
            cancelled |= matches!(run, SlotRun::Cancelled);
            self.apply_run(kind, run);
        }
        if cancelled {
            return Err(IntakeError::Cancelled);
        }

        Ok(kinds
            .iter()
            .map(|kind| (*kind, self.draft().slot(*kind).status().clone()))
            .collect())
    }

    /// Snapshot a slot for processing, or settle it from the re-processing guard.
    fn plan_job(&mut self, kind: DocumentKind) -> Result<Option<SlotJob>, IntakeError> {
        let slot = self.controller.draft().slot(kind);
        let file = slot.file().cloned().ok_or(IntakeError::NoFile(kind))?;
        if slot.is_done() {
            return Ok(None);
        }

        let identity = file.identity(self.guard);
        if slot.cached_for(&identity).is_some() {
            debug!(slot = kind.code(), file = %file.name, "same file already processed; reusing result");
            self.controller.draft_mut().slot_mut(kind).reuse_cached();
            self.publish_progress(kind);
            return Ok(None);
        }

        self.controller.draft_mut().slot_mut(kind).mark_processing();
        Ok(Some(SlotJob {
            kind,
            file,
            identity,
        }))
    }

    fn apply_run(&mut self, kind: DocumentKind, run: SlotRun) {
        let today = (self.today)();
        let draft = self.controller.draft_mut();

        match run {
            SlotRun::Completed(processed) => {
                if kind == DocumentKind::Id {
                    if let Some(fields) = processed.outcome.fields() {
                        draft.apply_id_extraction(fields, today);
                    }
                }
                draft.slot_mut(kind).finish(processed);
            }
            SlotRun::Transient(err) => draft.slot_mut(kind).needs_retry(err),
            SlotRun::Cancelled => draft.slot_mut(kind).interrupt(),
        }
        self.publish_progress(kind);
    }

    fn publish_progress(&self, kind: DocumentKind) {
        let current = self.draft().slot(kind).progress().clone();
        self.progress.sender(kind).send_replace(current);
    }

    /// Match the applicant's face against the ID photo.
    ///
    /// A successful match from earlier in the session is restored without
    /// opening the camera again.
    pub async fn capture_face(&mut self) -> Result<FaceMatchResult, IntakeError> {
        self.ensure_active()?;
        let id_digest = self.id_image()?.digest();
        if let Some(cached) = self.session.cached_face(&id_digest) {
            let result = cached.result;
            self.controller.set_face(cached);
            return Ok(result);
        }

        self.run_face_capture().await
    }

    /// Discard the current match and capture again.
    pub async fn retake_face(&mut self) -> Result<FaceMatchResult, IntakeError> {
        self.controller.clear_face();
        self.session.forget_face();
        self.run_face_capture().await
    }

    async fn run_face_capture(&mut self) -> Result<FaceMatchResult, IntakeError> {
        self.ensure_active()?;
        let id_image = self.id_image()?;
        let id_digest = id_image.digest();
        let id_image = id_image.bytes.clone();

        let engine = Arc::clone(self.session.face_engine());
        engine.load_models().await?;
        self.ensure_active()?;

        let countdown = &self.countdown;
        let frame = self
            .capture
            .run(self.camera.as_ref(), self.session.cancel_flag(), &|left| {
                countdown.send_replace(Some(left));
            })
            .await;
        self.countdown.send_replace(None);
        let frame = frame?;

        let result = engine.match_faces(&id_image, &frame).await?;
        self.ensure_active()?;

        let capture = FaceCapture { frame, result };
        self.session.remember_face(&id_digest, &capture);
        self.controller.set_face(capture);
        info!(is_match = result.is_match(), "face verification finished");
        Ok(result)
    }

    fn id_image(&self) -> Result<&UploadedFile, IntakeError> {
        self.draft()
            .slot(DocumentKind::Id)
            .file()
            .ok_or(IntakeError::MissingIdImage)
    }

    /// Assemble and send the application. A second call returns the first receipt.
    pub async fn submit(&mut self) -> Result<SubmissionReceipt, IntakeError> {
        if let Some(receipt) = &self.receipt {
            return Ok(receipt.clone());
        }
        self.ensure_active()?;

        let payload = assemble(
            self.draft(),
            self.session.user_id(),
            self.session.period_id(),
        )?;
        let receipt = self.submitter.submit(&payload).await?;
        self.receipt = Some(receipt.clone());
        Ok(receipt)
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    /// Cancel outstanding work and release session state.
    pub fn end(self) {
        self.session.end();
    }

    fn ensure_active(&self) -> Result<(), IntakeError> {
        if self.session.cancel_flag().is_cancelled() {
            Err(IntakeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl Drop for IntakeWizard {
    fn drop(&mut self) {
        self.session.cancel_flag().cancel();
    }
}

impl std::fmt::Debug for IntakeWizard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeWizard")
            .field("stage", &self.stage())
            .field("guard", &self.guard)
            .field("submitted", &self.receipt.is_some())
            .finish_non_exhaustive()
    }
}
