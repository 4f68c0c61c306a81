use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Fallback id when a custom criterion's name slugifies to nothing.
const FALLBACK_CRITERION_ID: &str = "criterion";
const CUSTOM_RATIONALE: &str = "HR-added custom criterion";
/// Custom criteria without a name are titled by the start of their question.
const DERIVED_NAME_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    #[default]
    Intern,
    Junior,
    Mid,
    Senior,
    Lead,
    Principal,
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Seniority::Intern => "intern",
            Seniority::Junior => "junior",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
            Seniority::Lead => "lead",
            Seniority::Principal => "principal",
        };
        f.write_str(label)
    }
}

/// One yes/no question of a rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    pub name: String,
    pub question: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub expected_evidence: Vec<String>,
    #[serde(default)]
    pub leniency_note: String,
    /// 0.0 – 1.0; sums to 1.0 across a finalized set.
    pub weight: f64,
    #[serde(default)]
    pub fail_examples: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A criterion added by hand before finalization.
#[derive(Debug, Clone, Deserialize)]
pub struct NewCriterion {
    #[serde(default)]
    pub name: Option<String>,
    pub question: String,
    pub weight: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Local edits applied to a generated rubric before it is frozen.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CriteriaEdits {
    #[serde(default)]
    pub remove: Vec<String>,
    /// Criterion id to new weight.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub add: Vec<NewCriterion>,
}

/// An ordered rubric plus its metadata. Mutable until finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaSet {
    #[serde(default)]
    pub role_summary: String,
    #[serde(default)]
    pub seniority: Seniority,
    #[serde(default)]
    pub total_criteria: usize,
    pub criteria: Vec<Criterion>,
}

impl CriteriaSet {
    /// Parses an uploaded criteria document and checks its basic shape.
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        let mut set: CriteriaSet =
            serde_json::from_str(raw).map_err(|e| ValidationError::MalformedCriteria(e.to_string()))?;
        set.validate()?;
        set.total_criteria = set.criteria.len();
        Ok(set)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.criteria.is_empty() {
            return Err(ValidationError::EmptyCriteria);
        }

        let mut seen = HashSet::new();
        for (index, criterion) in self.criteria.iter().enumerate() {
            if criterion.id.trim().is_empty() {
                return Err(ValidationError::MissingCriterionId { index });
            }
            if !seen.insert(criterion.id.as_str()) {
                return Err(ValidationError::DuplicateCriterion(criterion.id.clone()));
            }
            if criterion.question.trim().is_empty() {
                return Err(ValidationError::MissingQuestion(criterion.id.clone()));
            }
            check_weight(&criterion.id, criterion.weight)?;
        }
        Ok(())
    }

    pub fn total_weight(&self) -> f64 {
        self.criteria.iter().map(|c| c.weight).sum()
    }

    /// Appends a custom criterion and returns its generated id.
    pub fn add_criterion(&mut self, new: NewCriterion) -> Result<String, ValidationError> {
        let question = new.question.trim().to_string();
        if question.is_empty() {
            return Err(ValidationError::MissingQuestion("<new criterion>".to_string()));
        }

        let name = new
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| question.chars().take(DERIVED_NAME_CHARS).collect());

        let id = self.unique_id(&slugify(&name));
        check_weight(&id, new.weight)?;

        self.criteria.push(Criterion {
            id: id.clone(),
            name,
            question,
            rationale: CUSTOM_RATIONALE.to_string(),
            expected_evidence: vec![],
            leniency_note: String::new(),
            weight: new.weight,
            fail_examples: vec![],
            tags: new
                .tags
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        });
        self.total_criteria = self.criteria.len();
        Ok(id)
    }

    pub fn remove_criterion(&mut self, id: &str) -> Result<Criterion, ValidationError> {
        let index = self
            .criteria
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| ValidationError::UnknownCriterion(id.to_string()))?;
        let removed = self.criteria.remove(index);
        self.total_criteria = self.criteria.len();
        Ok(removed)
    }

    /// Finite weights are clamped into `0..=1`; NaN and infinities are rejected.
    pub fn set_weight(&mut self, id: &str, weight: f64) -> Result<(), ValidationError> {
        if !weight.is_finite() {
            return Err(ValidationError::InvalidWeight {
                id: id.to_string(),
                weight,
            });
        }
        let criterion = self
            .criteria
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| ValidationError::UnknownCriterion(id.to_string()))?;
        criterion.weight = weight.clamp(0.0, 1.0);
        Ok(())
    }

    /// Applies removals, then reweights, then additions.
    pub fn apply_edits(&mut self, edits: CriteriaEdits) -> Result<(), ValidationError> {
        for id in &edits.remove {
            self.remove_criterion(id)?;
        }
        for (id, weight) in &edits.weights {
            self.set_weight(id, *weight)?;
        }
        for new in edits.add {
            self.add_criterion(new)?;
        }
        Ok(())
    }

    /// Validates, renormalizes weights to sum to 1.0 and freezes the set.
    pub fn finalize(mut self) -> Result<FinalizedCriteria, ValidationError> {
        self.validate()?;
        self.renormalize();
        self.total_criteria = self.criteria.len();
        Ok(FinalizedCriteria(self))
    }

    /// An all-zero rubric falls back to equal weights.
    fn renormalize(&mut self) {
        let total = self.total_weight();
        let count = self.criteria.len() as f64;
        for criterion in &mut self.criteria {
            criterion.weight = if total > 0.0 {
                criterion.weight / total
            } else {
                1.0 / count
            };
        }
    }

    fn unique_id(&self, base: &str) -> String {
        let base = if base.is_empty() {
            FALLBACK_CRITERION_ID
        } else {
            base
        };
        let taken = |candidate: &str| self.criteria.iter().any(|c| c.id == candidate);
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

/// A rubric frozen for evaluation. Weights sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FinalizedCriteria(CriteriaSet);

impl FinalizedCriteria {
    pub fn criteria(&self) -> &[Criterion] {
        &self.0.criteria
    }

    pub fn len(&self) -> usize {
        self.0.criteria.len()
    }

    pub fn weight_of(&self, id: &str) -> Option<f64> {
        self.0.criteria.iter().find(|c| c.id == id).map(|c| c.weight)
    }
}

fn check_weight(id: &str, weight: f64) -> Result<(), ValidationError> {
    if weight.is_finite() && (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(ValidationError::InvalidWeight {
            id: id.to_string(),
            weight,
        })
    }
}

/// Lowercases and collapses every run of characters outside `[a-z0-9_]` into `_`.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_sep = false;
    for c in s.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            if pending_sep {
                slug.push('_');
                pending_sep = false;
            }
            slug.push(c);
        } else {
            pending_sep = true;
        }
    }
    if pending_sep {
        slug.push('_');
    }
    slug.trim_matches('_').to_string()
}
