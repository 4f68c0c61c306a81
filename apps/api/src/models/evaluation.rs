use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerValue {
    Yes,
    No,
}

/// Accepts `"yes"`/`"no"` in any case (plus `y`/`n`/`true`/`false`) or a JSON boolean.
impl<'de> Deserialize<'de> for AnswerValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bool(true) => Ok(AnswerValue::Yes),
            Raw::Bool(false) => Ok(AnswerValue::No),
            Raw::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
                "yes" | "y" | "true" => Ok(AnswerValue::Yes),
                "no" | "n" | "false" => Ok(AnswerValue::No),
                other => Err(de::Error::custom(format!(
                    "expected yes or no, got '{other}'"
                ))),
            },
        }
    }
}

/// The model's verdict on one criterion for one resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub criterion_id: String,
    #[serde(default)]
    pub question: String,
    pub answer: AnswerValue,
    #[serde(default)]
    pub reasons: Vec<String>,
}

impl Answer {
    pub fn is_yes(&self) -> bool {
        self.answer == AnswerValue::Yes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupLabel {
    StronglyConsider,
    PotentialFit,
    Rejected,
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupLabel::StronglyConsider => "strongly_consider",
            GroupLabel::PotentialFit => "potential_fit",
            GroupLabel::Rejected => "rejected",
        })
    }
}

/// Rubric evaluation of one document. Recomputed on every run, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub document_id: String,
    pub answers: Vec<Answer>,
    pub yes_count: usize,
    pub no_count: usize,
    pub has_profile_link: bool,
    pub profile_links: Vec<String>,
    /// Filled by an external profile-statistics lookup when one is wired in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<serde_json::Value>,
    pub weighted_score: f64,
    pub group: GroupLabel,
    pub rationale: String,
}

impl EvaluationResult {
    /// Share of criteria answered yes, as a 0–100 percentage.
    pub fn criteria_met_pct(&self) -> f64 {
        let total = self.yes_count + self.no_count;
        if total == 0 {
            return 0.0;
        }
        (self.yes_count as f64 / total as f64 * 1000.0).round() / 10.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionReason {
    #[serde(rename = "failed to parse")]
    FailedToParse,
    #[serde(rename = "missing required profile link")]
    MissingProfileLink,
    #[serde(rename = "processing error")]
    ProcessingError,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RejectionReason::FailedToParse => "failed to parse",
            RejectionReason::MissingProfileLink => "missing required profile link",
            RejectionReason::ProcessingError => "processing error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedDocument {
    pub document_id: String,
    pub reason: RejectionReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub has_profile_link: bool,
}

/// Every document ends in exactly one of these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Evaluated(EvaluationResult),
    Rejected(RejectedDocument),
}

impl DocumentOutcome {
    pub fn document_id(&self) -> &str {
        match self {
            DocumentOutcome::Evaluated(r) => &r.document_id,
            DocumentOutcome::Rejected(r) => &r.document_id,
        }
    }

    pub fn group(&self) -> GroupLabel {
        match self {
            DocumentOutcome::Evaluated(r) => r.group,
            DocumentOutcome::Rejected(_) => GroupLabel::Rejected,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub evaluated: usize,
    pub rejected_before_evaluation: usize,
    pub strongly_consider: usize,
    pub potential_fit: usize,
    pub rejected: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[DocumentOutcome]) -> Self {
        let mut summary = BatchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                DocumentOutcome::Evaluated(_) => summary.evaluated += 1,
                DocumentOutcome::Rejected(_) => summary.rejected_before_evaluation += 1,
            }
            match outcome.group() {
                GroupLabel::StronglyConsider => summary.strongly_consider += 1,
                GroupLabel::PotentialFit => summary.potential_fit += 1,
                GroupLabel::Rejected => summary.rejected += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_answer_value_accepts_loose_forms() {
        for (raw, expected) in [
            (json!("yes"), AnswerValue::Yes),
            (json!("YES"), AnswerValue::Yes),
            (json!(" No "), AnswerValue::No),
            (json!(true), AnswerValue::Yes),
            (json!(false), AnswerValue::No),
        ] {
            let parsed: AnswerValue = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(parsed, expected, "input {raw}");
        }
        assert!(serde_json::from_value::<AnswerValue>(json!("maybe")).is_err());
    }

    #[test]
    fn test_answer_value_serializes_lowercase() {
        assert_eq!(serde_json::to_value(AnswerValue::Yes).unwrap(), json!("yes"));
    }

    #[test]
    fn test_rejected_outcome_serializes_fixed_reason() {
        let outcome = DocumentOutcome::Rejected(RejectedDocument {
            document_id: "a.pdf".to_string(),
            reason: RejectionReason::MissingProfileLink,
            detail: None,
            has_profile_link: false,
        });
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "rejected");
        assert_eq!(value["reason"], "missing required profile link");
        assert!(value.get("detail").is_none());
    }

    #[test]
    fn test_criteria_met_pct() {
        let result = EvaluationResult {
            document_id: "b.pdf".to_string(),
            answers: vec![],
            yes_count: 2,
            no_count: 1,
            has_profile_link: true,
            profile_links: vec![],
            enrichment: None,
            weighted_score: 0.5,
            group: GroupLabel::PotentialFit,
            rationale: String::new(),
        };
        assert_eq!(result.criteria_met_pct(), 66.7);
    }
}
