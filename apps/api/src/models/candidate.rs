use serde::{Deserialize, Serialize};

/// Legacy three-tier classification, assigned by the model's own categorical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LegacyTier {
    #[serde(rename = "Group 1: High potential")]
    HighPotential,
    #[serde(rename = "Group 2: Silver medalist")]
    SilverMedalist,
    #[serde(rename = "Group 3: Rejected")]
    Rejected,
}

impl LegacyTier {
    /// Score bands: 80–100 / 60–79 / 0–59.
    pub fn from_score(score: u32) -> Self {
        match score {
            80.. => LegacyTier::HighPotential,
            60..=79 => LegacyTier::SilverMedalist,
            _ => LegacyTier::Rejected,
        }
    }

    /// Reads the model's group label ("Group 2: Silver medalist (Batch 2)", "group 1", ...).
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if label.contains("group 1") || label.contains("high potential") {
            Some(LegacyTier::HighPotential)
        } else if label.contains("group 2") || label.contains("silver") {
            Some(LegacyTier::SilverMedalist)
        } else if label.contains("group 3") || label.contains("rejected") {
            Some(LegacyTier::Rejected)
        } else {
            None
        }
    }

    pub fn is_shortlisted(self) -> bool {
        matches!(self, LegacyTier::HighPotential | LegacyTier::SilverMedalist)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
    pub github_url: String,
    pub group: LegacyTier,
    pub score: u32,
    pub python_proficiency: bool,
    pub ai_library_experience: bool,
    pub ml_exposure: bool,
    pub ai_project_evidence: bool,
    pub justification: String,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub id: String,
    pub name: String,
    pub reason: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingResponse {
    pub ranked_candidates: Vec<Candidate>,
    pub rejected_candidates: Vec<RejectedCandidate>,
    pub total_processed: usize,
}

impl RankingResponse {
    /// Orders ranked candidates by score, highest first; ties keep input order.
    pub fn new(
        mut ranked_candidates: Vec<Candidate>,
        rejected_candidates: Vec<RejectedCandidate>,
        total_processed: usize,
    ) -> Self {
        ranked_candidates.sort_by(|a, b| b.score.cmp(&a.score));
        Self {
            ranked_candidates,
            rejected_candidates,
            total_processed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bands() {
        assert_eq!(LegacyTier::from_score(100), LegacyTier::HighPotential);
        assert_eq!(LegacyTier::from_score(80), LegacyTier::HighPotential);
        assert_eq!(LegacyTier::from_score(79), LegacyTier::SilverMedalist);
        assert_eq!(LegacyTier::from_score(60), LegacyTier::SilverMedalist);
        assert_eq!(LegacyTier::from_score(59), LegacyTier::Rejected);
        assert_eq!(LegacyTier::from_score(0), LegacyTier::Rejected);
    }

    #[test]
    fn test_from_label_variants() {
        assert_eq!(
            LegacyTier::from_label("Group 1: High potential (shortlist)"),
            Some(LegacyTier::HighPotential)
        );
        assert_eq!(
            LegacyTier::from_label("Group 2: Silver medalist (Batch 2)"),
            Some(LegacyTier::SilverMedalist)
        );
        assert_eq!(
            LegacyTier::from_label("Group 3: Rejected"),
            Some(LegacyTier::Rejected)
        );
        assert_eq!(LegacyTier::from_label("unsure"), None);
    }

    fn candidate(name: &str, score: u32) -> Candidate {
        Candidate {
            id: name.to_string(),
            name: name.to_string(),
            github_url: format!("https://github.com/{name}"),
            group: LegacyTier::from_score(score),
            score,
            python_proficiency: true,
            ai_library_experience: false,
            ml_exposure: false,
            ai_project_evidence: false,
            justification: String::new(),
            file_name: format!("{name}.pdf"),
        }
    }

    #[test]
    fn test_ranking_is_stable_by_score() {
        let response = RankingResponse::new(
            vec![candidate("a", 70), candidate("b", 90), candidate("c", 70)],
            vec![],
            3,
        );
        let names: Vec<&str> = response
            .ranked_candidates
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_tier_serializes_as_label() {
        let json = serde_json::to_string(&LegacyTier::SilverMedalist).unwrap();
        assert_eq!(json, "\"Group 2: Silver medalist\"");
    }
}
