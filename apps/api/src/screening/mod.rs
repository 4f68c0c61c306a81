// Resume screening pipeline.
// extraction -> links -> evaluator -> grouping, with criteria generation in front
// and the legacy fixed-rubric ranking beside it. Model calls go through llm_client.

pub mod criteria;
pub mod evaluator;
pub mod export;
pub mod extraction;
pub mod grouping;
pub mod handlers;
pub mod links;
pub mod prompts;
pub mod ranking;
