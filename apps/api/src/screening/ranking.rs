//! Legacy ranking: one fixed rubric, three tiers, no criteria step.
//!
//! The model assigns the tier itself. A candidate is only ranked when the model
//! calls them qualified, places them in a shortlisted tier and returns a profile
//! link that passes the detector's validation.

use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::prompts::TALENT_ACQUISITION_SYSTEM;
use crate::llm_client::{CompletionRequest, LlmClient, LlmError};
use crate::models::candidate::{Candidate, LegacyTier, RankingResponse, RejectedCandidate};
use crate::models::evaluation::RejectionReason;
use crate::screening::extraction::Document;
use crate::screening::links::{DetectedLink, LinkDetector};
use crate::screening::prompts::{fill_template, truncate_for_prompt, LEGACY_RANKING_PROMPT_TEMPLATE};

const UNKNOWN_CANDIDATE: &str = "Unknown Candidate";
const PROCESSING_ERROR_NAME: &str = "Processing Error";
const INVALID_LINK_REASON: &str = "Invalid or malformed GitHub URL found.";
const NOT_SHORTLISTED_REASON: &str = "Did not meet the shortlist criteria.";

/// The model's verdict for one resume, as returned.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LegacyAssessment {
    pub candidate_name: String,
    pub github_url: String,
    pub group: String,
    pub is_qualified: bool,
    pub score: f64,
    pub python_proficiency: bool,
    pub ai_library_experience: bool,
    pub ml_exposure: bool,
    pub ai_project_evidence: bool,
    pub justification: String,
    pub rejection_reason: String,
}

pub struct RankingContext<'a> {
    pub llm: &'a LlmClient,
    pub model: &'a str,
    pub job_description: &'a str,
    pub max_resume_chars: usize,
    pub max_jd_chars: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Ranked(Candidate),
    Rejected(RejectedCandidate),
}

pub async fn rank_batch<F>(
    ctx: &RankingContext<'_>,
    documents: &[Document],
    mut on_progress: F,
) -> RankingResponse
where
    F: FnMut(usize, usize),
{
    let detector = LinkDetector::github();
    let total = documents.len();
    let mut ranked = Vec::new();
    let mut rejected = Vec::new();

    for (index, document) in documents.iter().enumerate() {
        match rank_document(ctx, detector, document).await {
            Placement::Ranked(candidate) => ranked.push(candidate),
            Placement::Rejected(candidate) => rejected.push(candidate),
        }
        on_progress(index + 1, total);
    }

    let response = RankingResponse::new(ranked, rejected, total);
    info!(
        "Legacy ranking finished: {} ranked, {} rejected",
        response.ranked_candidates.len(),
        response.rejected_candidates.len()
    );
    response
}

async fn rank_document(
    ctx: &RankingContext<'_>,
    detector: &LinkDetector,
    document: &Document,
) -> Placement {
    let text = match &document.text {
        Ok(text) => text,
        Err(e) => {
            warn!("Skipping {}: {e}", document.name);
            return reject(UNKNOWN_CANDIDATE, &RejectionReason::FailedToParse.to_string(), &document.name);
        }
    };

    let links = detector.detect(text);
    if links.is_empty() {
        return reject(
            UNKNOWN_CANDIDATE,
            &RejectionReason::MissingProfileLink.to_string(),
            &document.name,
        );
    }

    match assess(ctx, text, &links).await {
        Ok(assessment) => classify(assessment, &document.name, detector),
        Err(e) => {
            warn!("Ranking of {} failed: {e}", document.name);
            reject(
                PROCESSING_ERROR_NAME,
                &RejectionReason::ProcessingError.to_string(),
                &document.name,
            )
        }
    }
}

async fn assess(
    ctx: &RankingContext<'_>,
    text: &str,
    links: &[DetectedLink],
) -> Result<LegacyAssessment, LlmError> {
    let jd = truncate_for_prompt(ctx.job_description.trim(), ctx.max_jd_chars);
    let resume = truncate_for_prompt(text, ctx.max_resume_chars);
    let links = links
        .iter()
        .map(|l| l.url.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let prompt = fill_template(
        LEGACY_RANKING_PROMPT_TEMPLATE,
        &[("jd", &*jd), ("resume", &*resume), ("links", links.as_str())],
    );
    let request = CompletionRequest::new(ctx.model, TALENT_ACQUISITION_SYSTEM, prompt);
    ctx.llm.call_json(&request).await
}

/// Turns the model's verdict into a ranked or rejected candidate.
/// An invalid profile link rejects the candidate regardless of score.
pub fn classify(assessment: LegacyAssessment, file_name: &str, detector: &LinkDetector) -> Placement {
    let name = match assessment.candidate_name.trim() {
        "" => UNKNOWN_CANDIDATE.to_string(),
        name => name.to_string(),
    };
    let score = if assessment.score.is_finite() {
        assessment.score.round().clamp(0.0, 100.0) as u32
    } else {
        0
    };
    let tier = LegacyTier::from_label(&assessment.group).unwrap_or_else(|| LegacyTier::from_score(score));
    let link = detector.canonicalize(&assessment.github_url);

    match link {
        Some(github_url) if assessment.is_qualified && tier.is_shortlisted() => {
            Placement::Ranked(Candidate {
                id: Uuid::new_v4().to_string(),
                name,
                github_url,
                group: tier,
                score,
                python_proficiency: assessment.python_proficiency,
                ai_library_experience: assessment.ai_library_experience,
                ml_exposure: assessment.ml_exposure,
                ai_project_evidence: assessment.ai_project_evidence,
                justification: assessment.justification,
                file_name: file_name.to_string(),
            })
        }
        Some(_) => {
            let reason = match assessment.rejection_reason.trim() {
                "" => NOT_SHORTLISTED_REASON,
                reason => reason,
            };
            reject(&name, reason, file_name)
        }
        None => reject(&name, INVALID_LINK_REASON, file_name),
    }
}

fn reject(name: &str, reason: &str, file_name: &str) -> Placement {
    Placement::Rejected(RejectedCandidate {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        reason: reason.to_string(),
        file_name: file_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{scripted_client, ScriptedBackend};
    use serde_json::json;
    use std::sync::Arc;

    fn assessment(score: f64, group: &str, url: &str, qualified: bool) -> LegacyAssessment {
        LegacyAssessment {
            candidate_name: "Jane Doe".to_string(),
            github_url: url.to_string(),
            group: group.to_string(),
            is_qualified: qualified,
            score,
            python_proficiency: true,
            justification: "Strong Python and ML projects".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_qualified_candidate_with_valid_link_is_ranked() {
        let placement = classify(
            assessment(91.0, "Group 1: High potential (shortlist)", "github.com/janedoe", true),
            "jane.pdf",
            LinkDetector::github(),
        );
        match placement {
            Placement::Ranked(c) => {
                assert_eq!(c.group, LegacyTier::HighPotential);
                assert_eq!(c.github_url, "https://github.com/janedoe");
                assert_eq!(c.score, 91);
                assert_eq!(c.file_name, "jane.pdf");
            }
            other => panic!("expected ranked, got {other:?}"),
        }
    }

    #[test]
    fn test_high_score_never_overrides_invalid_link() {
        let placement = classify(
            assessment(98.0, "Group 1: High potential", "https://github.com/admin", true),
            "x.pdf",
            LinkDetector::github(),
        );
        match placement {
            Placement::Rejected(r) => assert_eq!(r.reason, INVALID_LINK_REASON),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_unqualified_candidate_keeps_model_reason() {
        let mut a = assessment(40.0, "Group 3: Rejected", "https://github.com/janedoe", false);
        a.rejection_reason = "No Python experience".to_string();
        match classify(a, "y.pdf", LinkDetector::github()) {
            Placement::Rejected(r) => {
                assert_eq!(r.reason, "No Python experience");
                assert_eq!(r.name, "Jane Doe");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_label_falls_back_to_score_band() {
        let placement = classify(
            assessment(65.4, "shortlist maybe", "https://github.com/janedoe", true),
            "z.pdf",
            LinkDetector::github(),
        );
        assert!(matches!(
            placement,
            Placement::Ranked(c) if c.group == LegacyTier::SilverMedalist && c.score == 65
        ));
    }

    #[test]
    fn test_assessment_tolerates_missing_fields() {
        let a: LegacyAssessment = serde_json::from_value(json!({ "candidateName": "Ann", "score": 72 })).unwrap();
        assert_eq!(a.candidate_name, "Ann");
        assert_eq!(a.score, 72.0);
        assert!(!a.is_qualified);
    }

    #[tokio::test]
    async fn test_batch_sorts_by_score_and_rejects_linkless_resumes() {
        let verdict = |name: &str, user: &str, score: u32| {
            Ok(json!({
                "candidateName": name,
                "githubUrl": format!("https://github.com/{user}"),
                "group": if score >= 80 { "Group 1: High potential" } else { "Group 2: Silver medalist" },
                "isQualified": true,
                "score": score,
                "justification": "ok"
            })
            .to_string())
        };
        let backend = Arc::new(ScriptedBackend::new(vec![
            verdict("Low", "low-user", 70),
            verdict("High", "high-user", 90),
        ]));
        let llm = scripted_client(backend.clone());
        let ctx = RankingContext {
            llm: &llm,
            model: "test-model",
            job_description: "AI engineer intern",
            max_resume_chars: 6000,
            max_jd_chars: 4000,
        };
        let documents = vec![
            Document { name: "low.txt".to_string(), text: Ok("Low github.com/low-user".to_string()) },
            Document { name: "none.txt".to_string(), text: Ok("No links at all".to_string()) },
            Document { name: "high.txt".to_string(), text: Ok("High github.com/high-user".to_string()) },
        ];

        let response = rank_batch(&ctx, &documents, |_, _| {}).await;

        assert_eq!(response.total_processed, 3);
        let names: Vec<&str> = response.ranked_candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["High", "Low"]);
        assert_eq!(response.rejected_candidates.len(), 1);
        assert_eq!(response.rejected_candidates[0].reason, "missing required profile link");
        assert_eq!(backend.call_count(), 2);
    }
}
