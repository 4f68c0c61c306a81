//! Resume Evaluator: answers every rubric question for one resume, then scores
//! and groups the result.
//!
//! Batches are processed one document at a time in input order; the shared
//! rate limiter inside `LlmClient` paces the calls. Every document yields exactly
//! one `DocumentOutcome`, whatever happens to its siblings.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::llm_client::prompts::{EVIDENCE_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::{CompletionRequest, LlmClient, LlmError};
use crate::models::criteria::FinalizedCriteria;
use crate::models::evaluation::{
    Answer, AnswerValue, DocumentOutcome, EvaluationResult, RejectedDocument, RejectionReason,
};
use crate::screening::extraction::Document;
use crate::screening::grouping::{assign_group, weighted_score, Grouping, Thresholds};
use crate::screening::links::{DetectedLink, LinkDetector};
use crate::screening::prompts::{
    evaluation_schema, fill_template, hr_notes_for_prompt, truncate_for_prompt,
    EVALUATION_PROMPT_TEMPLATE,
};

pub const MAX_REASONS: usize = 3;
const UNANSWERED_REASON: &str = "not answered by evaluator";

/// Everything that stays fixed across one batch.
pub struct EvaluationContext<'a> {
    pub llm: &'a LlmClient,
    pub model: &'a str,
    pub job_description: &'a str,
    pub hr_notes: &'a str,
    pub criteria: &'a FinalizedCriteria,
    pub thresholds: Thresholds,
    pub require_profile_link: bool,
    pub max_resume_chars: usize,
    pub max_jd_chars: usize,
}

#[derive(Debug, Deserialize)]
struct EvaluationReply {
    #[serde(default)]
    answers: Vec<Answer>,
}

/// Evaluates every document and reports progress after each one.
pub async fn evaluate_batch<F>(
    ctx: &EvaluationContext<'_>,
    documents: &[Document],
    mut on_progress: F,
) -> Vec<DocumentOutcome>
where
    F: FnMut(usize, usize),
{
    let detector = LinkDetector::github();
    let links: Vec<Vec<DetectedLink>> = documents
        .iter()
        .map(|doc| match &doc.text {
            Ok(text) => detector.detect(text),
            Err(_) => Vec::new(),
        })
        .collect();

    let total = documents.len();
    let mut outcomes = Vec::with_capacity(total);
    for (index, (document, links)) in documents.iter().zip(&links).enumerate() {
        outcomes.push(evaluate_document(ctx, document, links).await);
        on_progress(index + 1, total);
    }

    let evaluated = outcomes
        .iter()
        .filter(|o| matches!(o, DocumentOutcome::Evaluated(_)))
        .count();
    info!("Batch finished: {evaluated}/{total} documents evaluated");
    outcomes
}

async fn evaluate_document(
    ctx: &EvaluationContext<'_>,
    document: &Document,
    links: &[DetectedLink],
) -> DocumentOutcome {
    let text = match &document.text {
        Ok(text) => text,
        Err(e) => {
            warn!("Skipping {}: {e}", document.name);
            return rejected(document, RejectionReason::FailedToParse, Some(e.to_string()), false);
        }
    };

    let has_link = !links.is_empty();
    if ctx.require_profile_link && !has_link {
        debug!("Rejecting {}: no profile link", document.name);
        return rejected(document, RejectionReason::MissingProfileLink, None, false);
    }

    match evaluate_resume(ctx, &document.name, text, links).await {
        Ok(result) => DocumentOutcome::Evaluated(result),
        Err(e) => {
            warn!("Evaluation of {} failed: {e}", document.name);
            rejected(
                document,
                RejectionReason::ProcessingError,
                Some(e.to_string()),
                has_link,
            )
        }
    }
}

fn rejected(
    document: &Document,
    reason: RejectionReason,
    detail: Option<String>,
    has_profile_link: bool,
) -> DocumentOutcome {
    DocumentOutcome::Rejected(RejectedDocument {
        document_id: document.name.clone(),
        reason,
        detail,
        has_profile_link,
    })
}

/// One completion call for one resume, scored against the rubric.
pub async fn evaluate_resume(
    ctx: &EvaluationContext<'_>,
    document_id: &str,
    text: &str,
    links: &[DetectedLink],
) -> Result<EvaluationResult, LlmError> {
    let prompt = build_evaluation_prompt(ctx, text, links);
    let request =
        CompletionRequest::new(ctx.model, JSON_ONLY_SYSTEM, prompt).with_schema(evaluation_schema());

    let reply: EvaluationReply = ctx.llm.call_json(&request).await?;
    Ok(score_answers(
        document_id,
        reply.answers,
        links,
        ctx.criteria,
        ctx.thresholds,
    ))
}

pub fn build_evaluation_prompt(
    ctx: &EvaluationContext<'_>,
    text: &str,
    links: &[DetectedLink],
) -> String {
    let questions: Vec<serde_json::Value> = ctx
        .criteria
        .criteria()
        .iter()
        .map(|c| serde_json::json!({ "id": c.id, "question": c.question }))
        .collect();
    let questions = serde_json::Value::Array(questions).to_string();

    let links = if links.is_empty() {
        "(none detected)".to_string()
    } else {
        links
            .iter()
            .map(|l| l.url.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let jd = truncate_for_prompt(ctx.job_description.trim(), ctx.max_jd_chars);
    let hr = hr_notes_for_prompt(ctx.hr_notes);
    let resume = truncate_for_prompt(text, ctx.max_resume_chars);
    let max_reasons = MAX_REASONS.to_string();

    fill_template(
        EVALUATION_PROMPT_TEMPLATE,
        &[
            ("max_reasons", max_reasons.as_str()),
            ("evidence_instruction", EVIDENCE_INSTRUCTION),
            ("jd", &*jd),
            ("hr", &*hr),
            ("questions", questions.as_str()),
            ("links", links.as_str()),
            ("resume", &*resume),
        ],
    )
}

/// Aligns the model's answers with the rubric: one answer per criterion in rubric
/// order, unknown ids dropped, the first answer for an id kept, missing ones
/// recorded as "no".
pub fn reconcile_answers(raw: Vec<Answer>, criteria: &FinalizedCriteria) -> Vec<Answer> {
    let mut by_id: HashMap<String, Answer> = HashMap::new();
    for answer in raw {
        if criteria.weight_of(&answer.criterion_id).is_none() {
            debug!("Dropping answer for unknown criterion '{}'", answer.criterion_id);
            continue;
        }
        by_id.entry(answer.criterion_id.clone()).or_insert(answer);
    }

    criteria
        .criteria()
        .iter()
        .map(|criterion| match by_id.remove(&criterion.id) {
            Some(mut answer) => {
                answer.question = criterion.question.clone();
                answer.reasons.retain(|r| !r.trim().is_empty());
                answer.reasons.truncate(MAX_REASONS);
                answer
            }
            None => Answer {
                criterion_id: criterion.id.clone(),
                question: criterion.question.clone(),
                answer: AnswerValue::No,
                reasons: vec![UNANSWERED_REASON.to_string()],
            },
        })
        .collect()
}

pub fn score_answers(
    document_id: &str,
    raw: Vec<Answer>,
    links: &[DetectedLink],
    criteria: &FinalizedCriteria,
    thresholds: Thresholds,
) -> EvaluationResult {
    let answers = reconcile_answers(raw, criteria);
    let yes_count = answers.iter().filter(|a| a.is_yes()).count();
    let no_count = answers.len() - yes_count;
    let score = weighted_score(&answers, criteria);
    let Grouping { group, rationale } = assign_group(score, yes_count, no_count, thresholds);

    EvaluationResult {
        document_id: document_id.to_string(),
        answers,
        yes_count,
        no_count,
        has_profile_link: !links.is_empty(),
        profile_links: links.iter().map(|l| l.url.clone()).collect(),
        enrichment: None,
        weighted_score: score,
        group,
        rationale,
    }
}
