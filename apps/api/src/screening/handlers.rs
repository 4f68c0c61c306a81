use std::collections::HashMap;

use axum::{
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{AppError, ValidationError};
use crate::models::candidate::RankingResponse;
use crate::models::criteria::{CriteriaEdits, CriteriaSet, FinalizedCriteria};
use crate::models::evaluation::{BatchSummary, DocumentOutcome};
use crate::screening::criteria::{generate_criteria, GenerateCriteriaRequest};
use crate::screening::evaluator::{evaluate_batch, EvaluationContext};
use crate::screening::export::outcomes_to_csv;
use crate::screening::extraction::{extract_all, Upload};
use crate::screening::ranking::{rank_batch, RankingContext};
use crate::state::AppState;

/// Multipart fields that carry criteria JSON even when sent as a file.
const CRITERIA_FIELD: &str = "criteria";

#[derive(Deserialize)]
pub struct FinalizeCriteriaRequest {
    pub criteria: CriteriaSet,
    #[serde(default)]
    pub edits: CriteriaEdits,
}

#[derive(Serialize)]
pub struct EvaluateResponse {
    pub results: Vec<DocumentOutcome>,
    pub summary: BatchSummary,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct ExportRequest {
    pub results: Vec<DocumentOutcome>,
}

/// POST /api/v1/criteria/generate
pub async fn handle_generate_criteria(
    State(state): State<AppState>,
    Json(req): Json<GenerateCriteriaRequest>,
) -> Result<Json<CriteriaSet>, AppError> {
    let set = generate_criteria(
        &state.llm,
        &state.config.model_criteria,
        state.config.max_jd_chars,
        &req,
    )
    .await?;
    Ok(Json(set))
}

/// POST /api/v1/criteria/finalize
pub async fn handle_finalize_criteria(
    Json(req): Json<FinalizeCriteriaRequest>,
) -> Result<Json<FinalizedCriteria>, AppError> {
    let mut set = req.criteria;
    set.apply_edits(req.edits)?;
    let finalized = set.finalize()?;
    info!("Finalized rubric with {} criteria", finalized.len());
    Ok(Json(finalized))
}

/// POST /api/v1/evaluate
/// Multipart: job_description, hr_notes, criteria (JSON), require_profile_link,
/// strict_mode, and one or more resume files or ZIP archives.
pub async fn handle_evaluate(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<EvaluateResponse>, AppError> {
    let form = read_upload_form(multipart).await?;

    let job_description = form.required_text("job_description")?.to_string();
    let raw_criteria = form
        .text(CRITERIA_FIELD)
        .ok_or_else(|| ValidationError::MalformedCriteria("criteria field is required".to_string()))?;
    let criteria = CriteriaSet::from_json(raw_criteria)?.finalize()?;
    let require_profile_link = form.flag("require_profile_link", true)?;
    let strict_mode = form.flag("strict_mode", true)?;
    if form.files.is_empty() {
        return Err(ValidationError::NoDocuments.into());
    }

    let documents = extract_all(form.files, state.config.max_entry_bytes).await;
    let ctx = EvaluationContext {
        llm: &state.llm,
        model: &state.config.model_match,
        job_description: &job_description,
        hr_notes: form.fields.get("hr_notes").map(String::as_str).unwrap_or(""),
        criteria: &criteria,
        thresholds: state.config.grouping.select(strict_mode),
        require_profile_link,
        max_resume_chars: state.config.max_resume_chars,
        max_jd_chars: state.config.max_jd_chars,
    };

    let results = evaluate_batch(&ctx, &documents, |done, total| {
        info!("Evaluated {done}/{total} documents");
    })
    .await;

    Ok(Json(EvaluateResponse {
        summary: BatchSummary::from_outcomes(&results),
        results,
        timestamp: Utc::now(),
    }))
}

/// POST /api/v1/evaluate/export
pub async fn handle_export_csv(
    Json(req): Json<ExportRequest>,
) -> Result<impl IntoResponse, AppError> {
    let csv = outcomes_to_csv(&req.results)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"screening_results.csv\"",
            ),
        ],
        csv,
    ))
}

/// POST /api/v1/rank
/// Legacy fixed-rubric ranking. Multipart: job_description and resume files.
pub async fn handle_rank(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RankingResponse>, AppError> {
    let form = read_upload_form(multipart).await?;
    let job_description = form.required_text("job_description")?.to_string();
    if form.files.is_empty() {
        return Err(ValidationError::NoDocuments.into());
    }

    let documents = extract_all(form.files, state.config.max_entry_bytes).await;
    let ctx = RankingContext {
        llm: &state.llm,
        model: &state.config.model_match,
        job_description: &job_description,
        max_resume_chars: state.config.max_resume_chars,
        max_jd_chars: state.config.max_jd_chars,
    };

    let response = rank_batch(&ctx, &documents, |done, total| {
        info!("Ranked {done}/{total} documents");
    })
    .await;
    Ok(Json(response))
}

#[derive(Debug, Default)]
struct UploadForm {
    fields: HashMap<String, String>,
    files: Vec<Upload>,
}

impl UploadForm {
    fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    fn required_text(&self, name: &str) -> Result<&str, ValidationError> {
        match self.text(name).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ if name == "job_description" => Err(ValidationError::MissingJobDescription),
            _ => Err(ValidationError::InvalidField {
                field: name.to_string(),
                message: "is required".to_string(),
            }),
        }
    }

    fn flag(&self, name: &str, default: bool) -> Result<bool, ValidationError> {
        let Some(raw) = self.text(name) else {
            return Ok(default);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(default),
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ValidationError::InvalidField {
                field: name.to_string(),
                message: format!("expected a boolean, got '{other}'"),
            }),
        }
    }
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| invalid_field("multipart", e))? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);

        match file_name {
            Some(file_name) if name != CRITERIA_FIELD => {
                let bytes = field.bytes().await.map_err(|e| invalid_field(&name, e))?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.files.push(Upload {
                    name: file_name,
                    bytes,
                });
            }
            _ => {
                let bytes = field.bytes().await.map_err(|e| invalid_field(&name, e))?;
                let text = String::from_utf8(bytes.to_vec()).map_err(|e| invalid_field(&name, e))?;
                form.fields.insert(name, text);
            }
        }
    }

    info!(
        "Received {} files and {} form fields",
        form.files.len(),
        form.fields.len()
    );
    Ok(form)
}

fn invalid_field(field: &str, error: impl std::fmt::Display) -> ValidationError {
    ValidationError::InvalidField {
        field: field.to_string(),
        message: error.to_string(),
    }
}
