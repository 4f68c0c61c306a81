use std::collections::HashSet;

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::{AppError, ValidationError};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{CompletionRequest, LlmClient};
use crate::models::criteria::{slugify, CriteriaSet, Seniority};
use crate::screening::prompts::{
    criteria_schema, fill_template, hr_notes_for_prompt, truncate_for_prompt,
    CRITERIA_PROMPT_TEMPLATE,
};

pub const MAX_CRITERIA: usize = 20;
const DEFAULT_CRITERIA_COUNT: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateCriteriaRequest {
    pub job_description: String,
    #[serde(default)]
    pub hr_notes: String,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub seniority: Seniority,
}

fn default_count() -> usize {
    DEFAULT_CRITERIA_COUNT
}

impl GenerateCriteriaRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.job_description.trim().is_empty() {
            return Err(ValidationError::MissingJobDescription);
        }
        if !(1..=MAX_CRITERIA).contains(&self.count) {
            return Err(ValidationError::InvalidCriteriaCount {
                count: self.count,
                max: MAX_CRITERIA,
            });
        }
        Ok(())
    }
}

pub fn build_criteria_prompt(request: &GenerateCriteriaRequest, max_jd_chars: usize) -> String {
    let count = request.count.to_string();
    let seniority = request.seniority.to_string();
    let jd = truncate_for_prompt(request.job_description.trim(), max_jd_chars);
    let hr = hr_notes_for_prompt(&request.hr_notes);
    fill_template(
        CRITERIA_PROMPT_TEMPLATE,
        &[
            ("n", count.as_str()),
            ("seniority", seniority.as_str()),
            ("jd", &*jd),
            ("hr", &*hr),
        ],
    )
}

/// Asks the model for a rubric tailored to the job description.
///
/// The returned set is validated but not finalized: weights are whatever the model
/// produced, clamped to `0..=1`. Nothing is persisted.
pub async fn generate_criteria(
    llm: &LlmClient,
    model: &str,
    max_jd_chars: usize,
    request: &GenerateCriteriaRequest,
) -> Result<CriteriaSet, AppError> {
    request.validate()?;

    let prompt = build_criteria_prompt(request, max_jd_chars);
    let completion = CompletionRequest::new(model, JSON_ONLY_SYSTEM, prompt)
        .with_schema(criteria_schema());

    let mut set: CriteriaSet = llm
        .call_json(&completion)
        .await
        .map_err(|e| AppError::Llm(format!("Criteria generation failed: {e}")))?;

    tidy_generated(&mut set);
    set.validate()
        .map_err(|e| AppError::Llm(format!("Criteria generation returned an unusable rubric: {e}")))?;
    set.total_criteria = set.criteria.len();

    if set.criteria.len() != request.count {
        warn!(
            "Asked for {} criteria, model returned {}",
            request.count,
            set.criteria.len()
        );
    }
    info!(
        "Generated {} criteria for a {} role",
        set.criteria.len(),
        set.seniority
    );
    Ok(set)
}

/// Repairs the small slips models make: blank or repeated ids, out-of-range weights.
fn tidy_generated(set: &mut CriteriaSet) {
    let mut seen = HashSet::new();
    for criterion in &mut set.criteria {
        let mut id = slugify(&criterion.id);
        if id.is_empty() {
            id = slugify(&criterion.name);
        }
        if id.is_empty() {
            id = "criterion".to_string();
        }
        let base = id.clone();
        let mut n = 2;
        while !seen.insert(id.clone()) {
            id = format!("{base}_{n}");
            n += 1;
        }
        criterion.id = id;

        criterion.weight = if criterion.weight.is_finite() {
            criterion.weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }
}
