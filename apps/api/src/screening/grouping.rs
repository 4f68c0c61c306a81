use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::criteria::FinalizedCriteria;
use crate::models::evaluation::{Answer, GroupLabel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum weighted score for `strongly_consider`.
    pub strong: f64,
    /// Minimum weighted score for `potential_fit`.
    pub potential: f64,
}

impl Thresholds {
    pub const STRICT: Thresholds = Thresholds {
        strong: 0.85,
        potential: 0.60,
    };

    pub const RELAXED: Thresholds = Thresholds {
        strong: 0.75,
        potential: 0.50,
    };

    fn is_well_formed(&self) -> bool {
        (0.0..=1.0).contains(&self.strong)
            && (0.0..=1.0).contains(&self.potential)
            && self.strong >= self.potential
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("{mode} thresholds {strong},{potential} must lie in 0..1 with the upper not below the lower")]
    Malformed {
        mode: &'static str,
        strong: f64,
        potential: f64,
    },

    #[error("strict thresholds must not be below relaxed thresholds")]
    StrictLooserThanRelaxed,
}

/// Strict and relaxed threshold pairs; the caller picks one per batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupingPolicy {
    strict: Thresholds,
    relaxed: Thresholds,
}

impl Default for GroupingPolicy {
    fn default() -> Self {
        Self {
            strict: Thresholds::STRICT,
            relaxed: Thresholds::RELAXED,
        }
    }
}

impl GroupingPolicy {
    pub fn new(strict: Thresholds, relaxed: Thresholds) -> Result<Self, ThresholdError> {
        for (mode, t) in [("strict", strict), ("relaxed", relaxed)] {
            if !t.is_well_formed() {
                return Err(ThresholdError::Malformed {
                    mode,
                    strong: t.strong,
                    potential: t.potential,
                });
            }
        }
        if strict.strong < relaxed.strong || strict.potential < relaxed.potential {
            return Err(ThresholdError::StrictLooserThanRelaxed);
        }
        Ok(Self { strict, relaxed })
    }

    pub fn select(&self, strict_mode: bool) -> Thresholds {
        if strict_mode {
            self.strict
        } else {
            self.relaxed
        }
    }
}

/// Sum of the weights of criteria answered yes, over the total weight.
/// Rounded to 4 decimals; always within `[0, 1]`.
pub fn weighted_score(answers: &[Answer], criteria: &FinalizedCriteria) -> f64 {
    let total: f64 = criteria.criteria().iter().map(|c| c.weight).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let met: f64 = criteria
        .criteria()
        .iter()
        .filter(|c| {
            answers
                .iter()
                .any(|a| a.criterion_id == c.id && a.is_yes())
        })
        .map(|c| c.weight)
        .sum();
    round4((met / total).clamp(0.0, 1.0))
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub group: GroupLabel,
    pub rationale: String,
}

/// Maps a weighted score onto a group label with a rationale naming the score,
/// the threshold it was compared against and the yes/no counts.
pub fn assign_group(score: f64, yes_count: usize, no_count: usize, thresholds: Thresholds) -> Grouping {
    let counts = format!("{yes_count} yes / {no_count} no");
    if score >= thresholds.strong {
        Grouping {
            group: GroupLabel::StronglyConsider,
            rationale: format!(
                "Weighted score {score:.4} meets the strongly-consider threshold {:.2} ({counts})",
                thresholds.strong
            ),
        }
    } else if score >= thresholds.potential {
        Grouping {
            group: GroupLabel::PotentialFit,
            rationale: format!(
                "Weighted score {score:.4} meets the potential-fit threshold {:.2} but is below \
                 the strongly-consider threshold {:.2} ({counts})",
                thresholds.potential, thresholds.strong
            ),
        }
    } else {
        Grouping {
            group: GroupLabel::Rejected,
            rationale: format!(
                "Weighted score {score:.4} is below the potential-fit threshold {:.2} ({counts})",
                thresholds.potential
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::criteria::CriteriaSet;
    use crate::models::evaluation::AnswerValue;
    use serde_json::json;

    fn rubric(weights: &[f64]) -> FinalizedCriteria {
        let criteria: Vec<_> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| json!({ "id": format!("c{i}"), "name": format!("C{i}"), "question": format!("Q{i}?"), "weight": w }))
            .collect();
        CriteriaSet::from_json(&json!({ "criteria": criteria }).to_string())
            .unwrap()
            .finalize()
            .unwrap()
    }

    fn answers(pattern: &[bool]) -> Vec<Answer> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, yes)| Answer {
                criterion_id: format!("c{i}"),
                question: format!("Q{i}?"),
                answer: if *yes { AnswerValue::Yes } else { AnswerValue::No },
                reasons: vec![],
            })
            .collect()
    }

    fn rank(group: GroupLabel) -> u8 {
        match group {
            GroupLabel::Rejected => 0,
            GroupLabel::PotentialFit => 1,
            GroupLabel::StronglyConsider => 2,
        }
    }

    #[test]
    fn test_three_of_four_equal_criteria_is_potential_fit_when_strict() {
        let criteria = rubric(&[0.25, 0.25, 0.25, 0.25]);
        let score = weighted_score(&answers(&[true, true, true, false]), &criteria);
        assert_eq!(score, 0.75);

        let strict = assign_group(score, 3, 1, Thresholds::STRICT);
        assert_eq!(strict.group, GroupLabel::PotentialFit);
        assert!(strict.rationale.contains("0.7500"));
        assert!(strict.rationale.contains("3 yes / 1 no"));

        let relaxed = assign_group(score, 3, 1, Thresholds::RELAXED);
        assert_eq!(relaxed.group, GroupLabel::StronglyConsider);
    }

    #[test]
    fn test_weights_drive_the_score() {
        let criteria = rubric(&[0.5, 0.3, 0.2]);
        assert_eq!(weighted_score(&answers(&[true, false, false]), &criteria), 0.5);
        assert_eq!(weighted_score(&answers(&[false, true, true]), &criteria), 0.5);
        assert_eq!(weighted_score(&answers(&[true, true, true]), &criteria), 1.0);
        assert_eq!(weighted_score(&answers(&[false, false, false]), &criteria), 0.0);
    }

    #[test]
    fn test_flipping_no_to_yes_never_lowers_the_group() {
        let criteria = rubric(&[0.4, 0.3, 0.2, 0.1]);
        for mask in 0u8..16 {
            let base: Vec<bool> = (0..4).map(|i| mask & (1 << i) != 0).collect();
            for flip in (0..4).filter(|i| !base[*i]) {
                let mut better = base.clone();
                better[flip] = true;
                let before = weighted_score(&answers(&base), &criteria);
                let after = weighted_score(&answers(&better), &criteria);
                assert!(after >= before);
                for thresholds in [Thresholds::STRICT, Thresholds::RELAXED] {
                    let g0 = assign_group(before, 0, 0, thresholds).group;
                    let g1 = assign_group(after, 0, 0, thresholds).group;
                    assert!(rank(g1) >= rank(g0), "mask {mask:04b} flip {flip}");
                }
            }
        }
    }

    #[test]
    fn test_group_matches_thresholds() {
        for step in 0..=100 {
            let score = step as f64 / 100.0;
            let t = Thresholds::STRICT;
            let group = assign_group(score, 0, 0, t).group;
            let expected = if score >= t.strong {
                GroupLabel::StronglyConsider
            } else if score >= t.potential {
                GroupLabel::PotentialFit
            } else {
                GroupLabel::Rejected
            };
            assert_eq!(group, expected, "score {score}");
        }
    }

    #[test]
    fn test_policy_validation() {
        assert!(GroupingPolicy::new(Thresholds::STRICT, Thresholds::RELAXED).is_ok());
        assert!(matches!(
            GroupingPolicy::new(
                Thresholds { strong: 0.5, potential: 0.6 },
                Thresholds::RELAXED
            ),
            Err(ThresholdError::Malformed { mode: "strict", .. })
        ));
        assert!(matches!(
            GroupingPolicy::new(
                Thresholds::STRICT,
                Thresholds { strong: 1.2, potential: 0.5 }
            ),
            Err(ThresholdError::Malformed { mode: "relaxed", .. })
        ));
        assert_eq!(
            GroupingPolicy::new(Thresholds::RELAXED, Thresholds::STRICT),
            Err(ThresholdError::StrictLooserThanRelaxed)
        );
    }

    #[test]
    fn test_select_picks_mode() {
        let policy = GroupingPolicy::default();
        assert_eq!(policy.select(true), Thresholds::STRICT);
        assert_eq!(policy.select(false), Thresholds::RELAXED);
    }
}
