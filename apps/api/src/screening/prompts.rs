// Prompt templates for the screening pipeline.
// Placeholders are `{name}` tokens filled by `fill_template`; JSON braces in the
// templates are left alone.

use std::borrow::Cow;

use serde_json::json;

use crate::llm_client::JsonSchema;

const TRUNCATION_MARKER: &str = "\n...[truncated]";
pub const NO_HR_NOTES: &str = "(none provided)";
pub const MAX_HR_NOTES_CHARS: usize = 8000;

/// Criteria generation. Fill `{n}`, `{seniority}`, `{jd}`, `{hr}`.
pub const CRITERIA_PROMPT_TEMPLATE: &str = r#"You will design {n} evaluation criteria (Yes/No questions) to assess resumes for THIS role.
Return a JSON object that matches the schema exactly. No markdown, no extra text.

CONTEXT
-------
SENIORITY: {seniority}
JOB DESCRIPTION:
<<<JD>>>
{jd}
<<<END JD>>>

HR NOTES (optional):
<<<HR>>>
{hr}
<<<END HR>>>

PRINCIPLES
----------
- Focus on what matters for this role and seniority.
- Prefer impact and evidence over pedigree.
- Allow leniency: projects, open source and internships can substitute for formal experience.
- Each criterion is atomic and phrased as a Yes/No question.

SCHEMA
------
{
  "role_summary": "1-2 sentences",
  "seniority": "intern|junior|mid|senior|lead|principal",
  "total_criteria": {n},
  "criteria": [
    {
      "id": "snake_case_identifier",
      "name": "Short title",
      "question": "Yes/No question",
      "rationale": "Why this check matters here",
      "expected_evidence": ["concrete", "resume", "signals"],
      "leniency_note": "Where leniency is allowed",
      "weight": 0.0,
      "fail_examples": ["example of failing wording"],
      "tags": ["skills", "impact", "ownership", "communication"]
    }
  ]
}

OUTPUT RULES
------------
- Output ONLY the JSON object.
- Every id is unique snake_case.
- Weights are within 0..1 and sum to about 1 across the criteria.

Now produce the JSON.
"#;

/// Single-resume rubric evaluation. Fill `{jd}`, `{hr}`, `{questions}`, `{links}`,
/// `{resume}`, `{max_reasons}`, `{evidence_instruction}`.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"You are an expert technical recruiter.

Evaluate the RESUME against each QUESTION using the JD and HR NOTES.
Answer every question with "yes" or "no" and give up to {max_reasons} short reasons
(quotes or concise evidence from the resume).
{evidence_instruction}

JD:
<<<JD>>>
{jd}
<<<END JD>>>

HR NOTES:
<<<HR>>>
{hr}
<<<END HR>>>

QUESTIONS (array of {"id", "question"}):
{questions}

PROFILE LINKS FOUND IN THE RESUME:
{links}

RESUME:
<<<RESUME>>>
{resume}
<<<END RESUME>>>

Return JSON in exactly this shape, one entry per question id:
{
  "answers": [
    {
      "criterion_id": "<id from QUESTIONS>",
      "question": "<question text>",
      "answer": "yes",
      "reasons": ["short reason"]
    }
  ]
}
"#;

/// Legacy fixed-rubric ranking. Fill `{jd}`, `{resume}`, `{links}`.
pub const LEGACY_RANKING_PROMPT_TEMPLATE: &str = r#"You are analyzing a resume for the role below and must place the candidate in one of three groups.

Job Description:
---
{jd}
---

Candidate Resume:
---
{resume}
---

GitHub links detected in the resume: {links}

CLASSIFICATION GROUPS:
- Group 1: High potential (shortlist) - Score: 80-100
- Group 2: Silver medalist (Batch 2) - Score: 60-79
- Group 3: Rejected (not suitable) - Score: 0-59

MANDATORY: a GitHub profile link. Without one the candidate is Group 3.

PRIMARY CRITERIA:
1. Strong Python proficiency
2. AI library experience
3. ML model exposure (LLMs, neural networks, diffusion is a bonus)
4. AI fundamentals
5. AI project evidence

CLASSIFICATION LOGIC:
- Group 3: no GitHub link, or lacks basic Python/AI requirements
- Group 2: GitHub link and 3-4 primary criteria met
- Group 1: GitHub link and all primary criteria met

Use the most appropriate profile URL, written in full (https://github.com/username).
Use "Unknown Candidate" when no name is present.

Return JSON only:
{
  "candidateName": "string",
  "githubUrl": "string",
  "group": "string",
  "isQualified": true,
  "score": 0,
  "pythonProficiency": true,
  "aiLibraryExperience": true,
  "mlExposure": true,
  "aiProjectEvidence": true,
  "justification": "string",
  "rejectionReason": "string"
}
"#;

/// Replaces `{key}` placeholders in a single left-to-right pass, so inserted text
/// is never rescanned for further placeholders.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let hit = values.iter().find(|(key, _)| {
            tail.len() > key.len() + 1
                && tail[1..].starts_with(key)
                && tail[1 + key.len()..].starts_with('}')
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 2..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Keeps at most `max_chars` characters, marking the cut.
pub fn truncate_for_prompt(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
    }
}

pub fn hr_notes_for_prompt(hr_notes: &str) -> Cow<'_, str> {
    if hr_notes.trim().is_empty() {
        Cow::Borrowed(NO_HR_NOTES)
    } else {
        truncate_for_prompt(hr_notes, MAX_HR_NOTES_CHARS)
    }
}

pub fn criteria_schema() -> JsonSchema {
    JsonSchema {
        name: "criteria_set".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "role_summary": { "type": "string" },
                "seniority": {
                    "type": "string",
                    "enum": ["intern", "junior", "mid", "senior", "lead", "principal"]
                },
                "total_criteria": { "type": "integer" },
                "criteria": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "name": { "type": "string" },
                            "question": { "type": "string" },
                            "rationale": { "type": "string" },
                            "expected_evidence": { "type": "array", "items": { "type": "string" } },
                            "leniency_note": { "type": "string" },
                            "weight": { "type": "number" },
                            "fail_examples": { "type": "array", "items": { "type": "string" } },
                            "tags": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["id", "name", "question", "weight"]
                    }
                }
            },
            "required": ["role_summary", "seniority", "criteria"]
        }),
    }
}

pub fn evaluation_schema() -> JsonSchema {
    JsonSchema {
        name: "resume_evaluation".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "answers": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "criterion_id": { "type": "string" },
                            "question": { "type": "string" },
                            "answer": { "type": "string", "enum": ["yes", "no"] },
                            "reasons": { "type": "array", "items": { "type": "string" } }
                        },
                        "required": ["criterion_id", "answer", "reasons"]
                    }
                }
            },
            "required": ["answers"]
        }),
    }
}
