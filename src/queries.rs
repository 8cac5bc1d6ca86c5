// src/queries.rs
use crate::genai::{GenerateRequest, Generator};
use crate::pipeline::PipelineError;

fn build_plan_prompt(claim: &str, visual_evidence: &str) -> String {
    format!(
        "Based on this context:\n\
         Text Claim: {claim}\n\
         Visual Context: {visual_evidence}\n\n\
         Generate 3-4 specific search queries to verify if this is FACT or FAKE.\n\
         Focus on finding:\n\
         - Official news reports or fact-check coverage.\n\
         - Public records (government notifications, weather or astronomical data) when applicable.\n\
         - The original source of the image.\n\
         Return ONLY the queries, one per line."
    )
}

/// One query per non-empty trimmed line. Duplicates are kept; ordering is
/// the model's emission order.
pub fn parse_query_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Stage 2: ask the model for 3-4 evidence-seeking queries. An unusable
/// response yields an empty plan, not an error; the pipeline then simply
/// gathers no web evidence.
pub async fn plan_queries(
    client: &dyn Generator,
    claim: &str,
    visual_evidence: &str,
) -> Result<Vec<String>, PipelineError> {
    let out = client
        .generate(GenerateRequest::text(build_plan_prompt(claim, visual_evidence)))
        .await?;
    Ok(parse_query_lines(&out.text))
}
