use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::models::evaluation::{DocumentOutcome, GroupLabel};

const CSV_HEADER: [&str; 7] = [
    "document_id",
    "group",
    "github_present",
    "criteria_met_pct",
    "yes_count",
    "no_count",
    "rationale",
];

/// One spreadsheet row per document, in `CSV_HEADER` order.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    document_id: &'a str,
    group: GroupLabel,
    github_present: bool,
    criteria_met_pct: f64,
    yes_count: usize,
    no_count: usize,
    rationale: String,
}

impl<'a> From<&'a DocumentOutcome> for CsvRow<'a> {
    fn from(outcome: &'a DocumentOutcome) -> Self {
        match outcome {
            DocumentOutcome::Evaluated(r) => CsvRow {
                document_id: &r.document_id,
                group: r.group,
                github_present: r.has_profile_link,
                criteria_met_pct: r.criteria_met_pct(),
                yes_count: r.yes_count,
                no_count: r.no_count,
                rationale: r.rationale.clone(),
            },
            DocumentOutcome::Rejected(r) => CsvRow {
                document_id: &r.document_id,
                group: GroupLabel::Rejected,
                github_present: r.has_profile_link,
                criteria_met_pct: 0.0,
                yes_count: 0,
                no_count: 0,
                rationale: match &r.detail {
                    Some(detail) => format!("{}: {detail}", r.reason),
                    None => r.reason.to_string(),
                },
            },
        }
    }
}

/// Renders batch outcomes as CSV. The header row is written even for an empty batch.
pub fn outcomes_to_csv(outcomes: &[DocumentOutcome]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for outcome in outcomes {
        writer.serialize(CsvRow::from(outcome))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("failed to flush CSV: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}
