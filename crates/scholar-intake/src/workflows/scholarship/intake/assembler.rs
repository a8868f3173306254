use crate::workflows::scholarship::payload::{
    DocumentKind, DocumentPayload, DocumentSet, EncodedFile, SubmissionPayload,
};
use crate::workflows::scholarship::validation::{
    validate_payload, DraftValidationError, Requirement,
};

use super::draft::ApplicationDraft;

const FACE_FILE_NAME: &str = "face-capture.jpg";
const FACE_CONTENT_TYPE: &str = "image/jpeg";

/// Package a completed draft into one self-contained payload.
pub fn assemble(
    draft: &ApplicationDraft,
    user_id: &str,
    period_id: &str,
) -> Result<SubmissionPayload, DraftValidationError> {
    DraftValidationError::check(draft.all_unmet_requirements())?;

    let face = draft
        .face
        .as_ref()
        .filter(|capture| capture.result.is_match())
        .ok_or(DraftValidationError {
            unmet: vec![Requirement::FaceMatch],
        })?;

    let payload = SubmissionPayload {
        user_id: user_id.to_string(),
        period_id: period_id.to_string(),
        application_type: draft.application_type(),
        personal_info: draft.personal.clone(),
        id_image: document_file(draft, DocumentKind::Id)?,
        face_image: EncodedFile::from_bytes(FACE_FILE_NAME, FACE_CONTENT_TYPE, &face.frame),
        face_match: face.result.summary(),
        documents: DocumentSet {
            id: document_payload(draft, DocumentKind::Id)?,
            cog: document_payload(draft, DocumentKind::Cog)?,
            cor: document_payload(draft, DocumentKind::Cor)?,
        },
    };

    validate_payload(&payload)?;
    Ok(payload)
}

fn document_file(
    draft: &ApplicationDraft,
    kind: DocumentKind,
) -> Result<EncodedFile, DraftValidationError> {
    draft
        .slot(kind)
        .file()
        .map(|file| file.encode())
        .ok_or(DraftValidationError {
            unmet: vec![Requirement::DocumentFile(kind)],
        })
}

fn document_payload(
    draft: &ApplicationDraft,
    kind: DocumentKind,
) -> Result<DocumentPayload, DraftValidationError> {
    let file = document_file(draft, kind)?;
    let processed = draft.slot(kind).processed().ok_or(DraftValidationError {
        unmet: vec![Requirement::DocumentProcessed(kind)],
    })?;
    let fields = processed.outcome.fields();

    Ok(DocumentPayload {
        kind,
        file,
        ocr_text: processed.ocr_text.clone(),
        extracted_data: fields.map(|fields| fields.to_json_map()),
        accuracy: fields.and_then(|fields| fields.mean_accuracy()),
    })
}
