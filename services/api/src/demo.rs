use crate::infra::{InMemoryApplicationRepository, InMemoryObjectStorage};
use async_trait::async_trait;
use chrono::Local;
use clap::Args;
use scholar_intake::error::AppError;
use scholar_intake::workflows::scholarship::intake::{
    Camera, CaptureError, ExtractionChannel, ExtractionError, FaceDescriptor, FaceError,
    FaceModels, FaceVerificationEngine, IntakeSession, IntakeStage, IntakeWizard, ModelLoader,
    NormalizedFields, OcrProgress, RecognitionOutcome, StructuredExtractor, SubmissionError,
    SubmissionReceipt, SubmissionTransport, TextRecognizer, UploadedFile, WizardCollaborators,
};
use scholar_intake::workflows::scholarship::review::{
    ApplicationId, ApplicationService, ApplicationServiceError, ApplicationStatus,
};
use scholar_intake::workflows::scholarship::{ApplicationType, DocumentKind, SubmissionPayload};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

type DemoService = ApplicationService<InMemoryApplicationRepository, InMemoryObjectStorage>;

const ID_TEXT: &str =
    "REPUBLIC OF THE PHILIPPINES\nPHILIPPINE IDENTIFICATION CARD\nMARIA CLARA BAUTISTA\n2002-08-14";
const GRADES_TEXT: &str = "CERTIFICATE OF GRADES\nFIRST SEMESTER 2024-2025\nGWA 1.62";
const REGISTRATION_TEXT: &str = "CERTIFICATE OF REGISTRATION\nBS NURSING 3RD YEAR\nTOTAL UNITS 24";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Run the shorter renewal flow (no personal information stages)
    #[arg(long)]
    pub(crate) renewal: bool,
    /// ID image to upload instead of the built-in sample
    #[arg(long)]
    pub(crate) id_image: Option<PathBuf>,
    /// Certificate of grades to upload instead of the built-in sample
    #[arg(long)]
    pub(crate) grades: Option<PathBuf>,
    /// Certificate of registration to upload instead of the built-in sample
    #[arg(long)]
    pub(crate) registration: Option<PathBuf>,
    /// Reject the application at the end of review instead of approving it
    #[arg(long)]
    pub(crate) reject: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        renewal,
        id_image,
        grades,
        registration,
        reject,
    } = args;

    let application_type = if renewal {
        ApplicationType::Renewal
    } else {
        ApplicationType::New
    };

    let id_file = load_file(
        id_image,
        "sample-id.jpg",
        "image/jpeg",
        &[0xff, 0xd8, 0x42, 0x9a, 0x13],
    )?;
    let grades_file = load_file(grades, "sample-cog.pdf", "application/pdf", b"%PDF-1.7 cog")?;
    let registration_file = load_file(
        registration,
        "sample-cor.png",
        "image/png",
        &[0x89, 0x50, 0x4e, 0x47, 0x0d],
    )?;

    let recognizer = CannedRecognizer::from_files([
        (&id_file, ID_TEXT),
        (&grades_file, GRADES_TEXT),
        (&registration_file, REGISTRATION_TEXT),
    ]);
    let storage = Arc::new(InMemoryObjectStorage::default());
    let service: Arc<DemoService> = Arc::new(ApplicationService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        storage.clone(),
    ));
    let session = Arc::new(IntakeSession::new(
        "demo-applicant",
        "demo-period",
        Arc::new(FaceVerificationEngine::new(Arc::new(ByteProfileLoader))),
    ));
    let mut wizard = IntakeWizard::new(
        session,
        application_type,
        WizardCollaborators {
            recognizer: Arc::new(recognizer),
            extractor: Arc::new(CannedExtractor::standard()),
            camera: Arc::new(MirrorCamera(id_file.bytes.clone())),
            submitter: Arc::new(InProcessSubmitter(service.clone())),
        },
    );

    println!("Scholarship intake demo ({})", application_type.label());
    let stages: Vec<String> = wizard.stages().iter().map(ToString::to_string).collect();
    println!("Stages: {}", stages.join(" -> "));

    println!("\n[{}]", wizard.stage());
    upload(&mut wizard, DocumentKind::Id, id_file)?;
    let status = wizard.process_id_document().await?;
    println!("  ID processed: {status:?}");
    print_outcome(&wizard, DocumentKind::Id);
    let personal = &wizard.draft().personal;
    println!(
        "  Prefilled: {} | born {} | age {}",
        personal.full_name(),
        personal.date_of_birth,
        personal
            .age
            .map(|age| age.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );
    wizard.advance()?;

    println!("\n[{}]", wizard.stage());
    let mut countdown = wizard.countdown_receiver();
    let ticker = tokio::spawn(async move {
        while countdown.changed().await.is_ok() {
            if let Some(seconds) = *countdown.borrow() {
                println!("  capturing in {seconds}...");
            }
        }
    });
    let face = wizard.capture_face().await?;
    ticker.abort();
    match face.distance() {
        Some(distance) => println!(
            "  Face distance {:.3} -> {}",
            distance,
            if face.is_match() { "match" } else { "no match" }
        ),
        None => println!("  No face detected on the ID or the capture"),
    }
    wizard.advance()?;

    if matches!(wizard.stage(), IntakeStage::PersonalInfo) {
        println!("\n[{}]", wizard.stage());
        wizard.update_personal(|info| {
            if info.contact_number.is_empty() {
                info.contact_number = "09171112233".to_string();
            }
        });
        wizard.advance()?;

        println!("\n[{}]", wizard.stage());
        wizard.update_personal(|info| {
            info.school_name = "University of the Philippines Manila".to_string();
            info.course = "BS Nursing".to_string();
            info.year_level = "3".to_string();
            info.student_number = "2022-31415".to_string();
            info.guardian_name = "Elena Bautista".to_string();
            info.guardian_contact = "09184445566".to_string();
        });
        wizard.advance()?;
    }

    println!("\n[{}]", wizard.stage());
    upload(&mut wizard, DocumentKind::Cog, grades_file)?;
    upload(&mut wizard, DocumentKind::Cor, registration_file)?;
    for (kind, status) in wizard.process_documents().await? {
        println!("  {kind}: {status:?}");
        print_outcome(&wizard, kind);
    }

    let receipt = wizard.submit().await?;
    println!("\nSubmitted application {}", receipt.application_id);
    wizard.end();

    let application_id: ApplicationId = match receipt.application_id.parse() {
        Ok(id) => id,
        Err(err) => {
            println!("  Receipt is not a review application id: {err}");
            return Ok(());
        }
    };

    println!("\nReview");
    let decision = if reject {
        ApplicationStatus::Rejected
    } else {
        ApplicationStatus::Approved
    };
    for next in [ApplicationStatus::UnderReview, decision] {
        let record = service.transition(&application_id, next)?;
        println!(
            "  -> {} at {}",
            record.status,
            record
                .updated_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
    }
    if let Err(err) = service.transition(&application_id, ApplicationStatus::UnderReview) {
        println!("  Reopening refused: {err}");
    }

    let record = service.get(&application_id)?;
    match serde_json::to_string_pretty(&record.view()) {
        Ok(json) => println!("  Reviewer view:\n{json}"),
        Err(err) => println!("  Reviewer view unavailable: {err}"),
    }

    let documents = service.documents(&application_id)?;
    println!(
        "  Stored {} OCR records, grades certificate: {}, registration certificate: {}",
        documents.ocr_records.len(),
        if documents.grades.is_some() { "yes" } else { "no" },
        if documents.registration.is_some() { "yes" } else { "no" },
    );
    println!("  Objects:");
    for (key, object) in storage.objects() {
        println!("    - {key} ({}, {} bytes)", object.content_type, object.size);
    }

    Ok(())
}

fn load_file(
    path: Option<PathBuf>,
    sample_name: &str,
    sample_type: &str,
    sample_bytes: &[u8],
) -> Result<UploadedFile, AppError> {
    let Some(path) = path else {
        return Ok(UploadedFile::new(sample_name, sample_type, sample_bytes.to_vec()));
    };

    let bytes = std::fs::read(&path)?;
    let content_type = mime_guess::from_path(&path).first_or_octet_stream();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| sample_name.to_string());
    Ok(UploadedFile::new(name, content_type.essence_str(), bytes))
}

fn upload(wizard: &mut IntakeWizard, kind: DocumentKind, file: UploadedFile) -> Result<(), AppError> {
    println!("  Uploading {} for {kind}", file.name);
    wizard.drop_file(kind, file)?;
    wizard.confirm_upload()?;
    Ok(())
}

fn print_outcome(wizard: &IntakeWizard, kind: DocumentKind) {
    let Some(processed) = wizard.draft().slot(kind).processed() else {
        return;
    };
    if let Some(warning) = processed.outcome.warning() {
        println!("    warning: {warning}");
    }
    match processed.outcome.fields() {
        Some(fields) => println!("    extracted {} fields", fields.len()),
        None => println!("    no structured fields; OCR text kept for review"),
    }
}

/// Returns fixed text for each known upload, keyed by file name.
struct CannedRecognizer {
    texts: HashMap<String, &'static str>,
}

impl CannedRecognizer {
    fn from_files<'a>(files: impl IntoIterator<Item = (&'a UploadedFile, &'static str)>) -> Self {
        Self {
            texts: files
                .into_iter()
                .map(|(file, text)| (file.name.clone(), text))
                .collect(),
        }
    }
}

#[async_trait]
impl TextRecognizer for CannedRecognizer {
    async fn recognize(
        &self,
        file: &UploadedFile,
        on_progress: &(dyn Fn(OcrProgress) + Send + Sync),
    ) -> RecognitionOutcome {
        on_progress(OcrProgress::new(40, "recognizing text"));
        on_progress(OcrProgress::new(100, "recognizing text"));
        RecognitionOutcome {
            text: self
                .texts
                .get(&file.name)
                .map(|text| text.to_string())
                .unwrap_or_default(),
            error: None,
        }
    }
}

struct CannedExtractor {
    replies: HashMap<ExtractionChannel, Value>,
}

impl CannedExtractor {
    fn standard() -> Self {
        Self {
            replies: HashMap::from([
                (
                    ExtractionChannel::Id,
                    json!({
                        "first_name": { "value": "Maria", "accuracy": 0.97 },
                        "middle_name": "Clara",
                        "last_name": { "value": "Bautista", "accuracy": 0.95 },
                        "date_of_birth": "2002-08-14",
                        "sex": "Female",
                        "address": "Ermita, Manila",
                    }),
                ),
                (
                    ExtractionChannel::Grades,
                    json!({
                        "student_name": "Maria Clara Bautista",
                        "school_year": "2024-2025",
                        "semester": "First",
                        "gwa": "1.62",
                        "subjects": [{ "code": "NCM 101", "grade": "1.50" }],
                    }),
                ),
                (
                    ExtractionChannel::Registration,
                    json!({
                        "student_number": "2022-31415",
                        "course": "BS Nursing",
                        "year_level": "3",
                        "total_units": 24,
                    }),
                ),
            ]),
        }
    }
}

#[async_trait]
impl StructuredExtractor for CannedExtractor {
    async fn extract(
        &self,
        channel: ExtractionChannel,
        _raw_text: &str,
        _file: Option<&UploadedFile>,
        _user_id: Option<&str>,
    ) -> Result<Option<NormalizedFields>, ExtractionError> {
        let Some(Value::Object(reply)) = self.replies.get(&channel) else {
            return Ok(None);
        };
        let fields: BTreeMap<String, Value> = reply
            .iter()
            .map(|(key, value)| {
                let bare = value.get("value").cloned().unwrap_or_else(|| value.clone());
                (key.clone(), bare)
            })
            .collect();
        Ok(Some(NormalizedFields::from_map(fields)))
    }
}

/// Describes an image by how its bytes spread over four value bands.
struct ByteProfileModels;

impl FaceModels for ByteProfileModels {
    fn descriptor(&self, image: &[u8]) -> Result<Option<FaceDescriptor>, FaceError> {
        if image.is_empty() {
            return Ok(None);
        }

        let mut bands = [0f32; 4];
        for byte in image {
            bands[usize::from(byte >> 6)] += 1.0;
        }
        let total = image.len() as f32;
        Ok(Some(FaceDescriptor::new(
            bands.iter().map(|count| count / total).collect(),
        )))
    }
}

struct ByteProfileLoader;

#[async_trait]
impl ModelLoader for ByteProfileLoader {
    async fn load(&self) -> Result<Arc<dyn FaceModels>, FaceError> {
        Ok(Arc::new(ByteProfileModels))
    }
}

/// Captures a frame that looks exactly like the uploaded ID.
struct MirrorCamera(Vec<u8>);

#[async_trait]
impl Camera for MirrorCamera {
    async fn start(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn capture_frame(&self) -> Result<Vec<u8>, CaptureError> {
        Ok(self.0.clone())
    }

    async fn stop(&self) {}
}

struct InProcessSubmitter(Arc<DemoService>);

#[async_trait]
impl SubmissionTransport for InProcessSubmitter {
    async fn submit(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let record = self.0.submit(payload.clone()).map_err(|err| {
            let status = match &err {
                ApplicationServiceError::Validation(_) => 422,
                _ => 500,
            };
            SubmissionError::Rejected {
                status,
                message: err.to_string(),
            }
        })?;

        Ok(SubmissionReceipt {
            application_id: record.id.to_string(),
        })
    }
}
