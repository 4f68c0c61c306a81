// Shared prompt constants.
// Each screening step that calls the model defines its own prompt templates in
// `screening::prompts`; this file only holds cross-cutting fragments.

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are an exacting hiring evaluator. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// System prompt for the legacy single-resume ranking call.
pub const TALENT_ACQUISITION_SYSTEM: &str =
    "You are an expert Talent Acquisition specialist. Return only valid JSON.";

/// Appended to prompts that embed untrusted document text.
pub const EVIDENCE_INSTRUCTION: &str = "\
    Judge only from the text provided. Do NOT assume skills, employers, or links \
    that are not written in the resume. When evidence is missing, answer no.";
