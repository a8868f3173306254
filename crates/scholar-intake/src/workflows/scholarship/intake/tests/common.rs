use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::workflows::scholarship::intake::extraction::{
    ExtractionChannel, ExtractionError, NormalizedFields, StructuredExtractor,
};
use crate::workflows::scholarship::intake::face::{
    Camera, CaptureError, FaceDescriptor, FaceError, FaceModels, FaceVerificationEngine,
    ModelLoader,
};
use crate::workflows::scholarship::intake::file::UploadedFile;
use crate::workflows::scholarship::intake::ocr::{OcrProgress, RecognitionOutcome, TextRecognizer};
use crate::workflows::scholarship::intake::session::IntakeSession;
use crate::workflows::scholarship::intake::submit::{
    SubmissionError, SubmissionReceipt, SubmissionTransport,
};
use crate::workflows::scholarship::intake::wizard::{IntakeWizard, WizardCollaborators};
use crate::workflows::scholarship::payload::{ApplicationType, SubmissionPayload};

pub(super) type ExtractionReply = Result<Option<NormalizedFields>, ExtractionError>;

/// Returns text keyed by file name; unknown files yield no text.
#[derive(Default)]
pub(super) struct ScriptedRecognizer {
    texts: HashMap<String, String>,
    pub(super) calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub(super) fn with(mut self, file_name: &str, text: &str) -> Self {
        self.texts.insert(file_name.to_string(), text.to_string());
        self
    }
}

#[async_trait]
impl TextRecognizer for ScriptedRecognizer {
    async fn recognize(
        &self,
        file: &UploadedFile,
        on_progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> RecognitionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        on_progress(OcrProgress::new(50, "recognizing text"));
        on_progress(OcrProgress::new(100, "recognizing text"));
        RecognitionOutcome {
            text: self.texts.get(&file.name).cloned().unwrap_or_default(),
            error: None,
        }
    }
}

/// Replies from a per-channel queue; an exhausted queue answers "nothing extracted".
#[derive(Default)]
pub(super) struct ScriptedExtractor {
    replies: Mutex<HashMap<ExtractionChannel, VecDeque<ExtractionReply>>>,
    calls: Mutex<Vec<ExtractionChannel>>,
}

impl ScriptedExtractor {
    pub(super) fn reply(self, channel: ExtractionChannel, reply: ExtractionReply) -> Self {
        self.replies
            .lock()
            .expect("replies lock")
            .entry(channel)
            .or_default()
            .push_back(reply);
        self
    }

    pub(super) fn calls(&self, channel: ExtractionChannel) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|called| **called == channel)
            .count()
    }
}

#[async_trait]
impl StructuredExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        channel: ExtractionChannel,
        _raw_text: &str,
        _file: Option<&UploadedFile>,
        _user_id: Option<&str>,
    ) -> ExtractionReply {
        self.calls.lock().expect("calls lock").push(channel);
        self.replies
            .lock()
            .expect("replies lock")
            .get_mut(&channel)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(None))
    }
}

/// First byte of an image is its one-dimensional descriptor; 0 means no face.
pub(super) struct ByteModels;

impl FaceModels for ByteModels {
    fn descriptor(&self, image: &[u8]) -> Result<Option<FaceDescriptor>, FaceError> {
        match image.first() {
            None | Some(0) => Ok(None),
            Some(byte) => Ok(Some(FaceDescriptor::new(vec![f32::from(*byte) / 10.0]))),
        }
    }
}

pub(super) struct ByteModelLoader;

#[async_trait]
impl ModelLoader for ByteModelLoader {
    async fn load(&self) -> Result<Arc<dyn FaceModels>, FaceError> {
        Ok(Arc::new(ByteModels))
    }
}

pub(super) struct FixedCamera {
    frame: Vec<u8>,
    pub(super) starts: AtomicUsize,
    pub(super) stops: AtomicUsize,
}

impl FixedCamera {
    pub(super) fn new(frame: Vec<u8>) -> Self {
        Self {
            frame,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Camera for FixedCamera {
    async fn start(&self) -> Result<(), CaptureError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn capture_frame(&self) -> Result<Vec<u8>, CaptureError> {
        Ok(self.frame.clone())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(super) struct RecordingSubmitter {
    pub(super) payloads: Mutex<Vec<SubmissionPayload>>,
}

#[async_trait]
impl SubmissionTransport for RecordingSubmitter {
    async fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let mut payloads = self.payloads.lock().expect("payloads lock");
        payloads.push(payload.clone());
        Ok(SubmissionReceipt {
            application_id: format!("app-{}", payloads.len()),
        })
    }
}

pub(super) struct Harness {
    pub(super) wizard: IntakeWizard,
    pub(super) recognizer: Arc<ScriptedRecognizer>,
    pub(super) extractor: Arc<ScriptedExtractor>,
    pub(super) camera: Arc<FixedCamera>,
    pub(super) submitter: Arc<RecordingSubmitter>,
}

pub(super) fn june_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
}

pub(super) fn harness(
    application_type: ApplicationType,
    recognizer: ScriptedRecognizer,
    extractor: ScriptedExtractor,
    camera_frame: Vec<u8>,
) -> Harness {
    let recognizer = Arc::new(recognizer);
    let extractor = Arc::new(extractor);
    let camera = Arc::new(FixedCamera::new(camera_frame));
    let submitter = Arc::new(RecordingSubmitter::default());
    let session = Arc::new(IntakeSession::new(
        "user-42",
        "2025-1st",
        Arc::new(FaceVerificationEngine::new(Arc::new(ByteModelLoader))),
    ));

    let wizard = IntakeWizard::new(
        session,
        application_type,
        WizardCollaborators {
            recognizer: recognizer.clone(),
            extractor: extractor.clone(),
            camera: camera.clone(),
            submitter: submitter.clone(),
        },
    )
    .with_clock(june_first);

    Harness {
        wizard,
        recognizer,
        extractor,
        camera,
        submitter,
    }
}

pub(super) fn fields(value: Value) -> NormalizedFields {
    let map = value
        .as_object()
        .expect("object literal")
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect::<BTreeMap<_, _>>();
    NormalizedFields::from_map(map)
}

/// ID whose first byte reads as a face.
pub(super) fn id_card() -> UploadedFile {
    UploadedFile::new("philsys-id.jpg", "image/jpeg", vec![10, 1, 2, 3])
}

pub(super) fn grades() -> UploadedFile {
    UploadedFile::new("grades.pdf", "application/pdf", b"%PDF-grades".to_vec())
}

pub(super) fn registration() -> UploadedFile {
    UploadedFile::new("registration.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47])
}

pub(super) fn standard_recognizer() -> ScriptedRecognizer {
    ScriptedRecognizer::default()
        .with("philsys-id.jpg", "REPUBLIC OF THE PHILIPPINES JUAN DELA CRUZ 01/15/2000")
        .with("grades.pdf", "CERTIFICATE OF GRADES GWA 1.75")
        .with("registration.png", "CERTIFICATE OF REGISTRATION BSCS")
}
