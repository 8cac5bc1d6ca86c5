// src/verdict.rs
use serde::Deserialize;

use crate::genai::{GenerateRequest, Generator};
use crate::pipeline::PipelineError;
use crate::types::{Confidence, SourceRef, Sources, Verdict, VerdictRecord};

fn build_final_prompt(claim_context: &str, corpus: &str) -> String {
    format!(
        "CLAIM CONTEXT: {claim_context}\n\
         COLLECTED EVIDENCE: {corpus}\n\n\
         Decide if this is FACT or FAKE.\n\
         Return ONLY a JSON object. No markdown backticks. Keys:\n\
         - verdict: FACT, FAKE, or UNVERIFIED\n\
         - reasoning: precise 1-2 sentence logic\n\
         - sources: the sources you relied on\n\
         - confidence: strictly HIGH, MEDIUM, or LOW\n\
         - type: the kind of claim or manipulation (Deepfake, GAN, Phishing, Authentic, \
         election notification, campaign, etc.)"
    )
}

/// Strip a single markdown code fence, with or without a `json` language
/// tag, from around the payload. Already-clean text passes through
/// unchanged, so the operation is idempotent.
pub fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.trim_end().strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// The shape the model is asked to emit. Its self-reported `sources`
/// field is ignored under the grounding-extracted policy, so it is not
/// even deserialized.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    verdict: String,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    confidence: Option<String>,
    #[serde(rename = "type", default)]
    category: String,
}

fn parse_verdict_label(label: &str) -> Result<Verdict, PipelineError> {
    match label.trim().to_ascii_uppercase().as_str() {
        "FACT" => Ok(Verdict::Fact),
        "FAKE" => Ok(Verdict::Fake),
        "UNVERIFIED" => Ok(Verdict::Unverified),
        other => Err(PipelineError::MalformedOutput(format!(
            "unexpected verdict label: {other:?}"
        ))),
    }
}

fn parse_confidence(label: Option<&str>) -> Option<Confidence> {
    match label?.trim().to_ascii_uppercase().as_str() {
        "HIGH" => Some(Confidence::High),
        "MEDIUM" => Some(Confidence::Medium),
        "LOW" => Some(Confidence::Low),
        _ => None,
    }
}

/// Source policy: grounding-extracted. The record carries the citations
/// the grounded searches actually returned; a FAKE verdict always carries
/// the not-found marker, and a verdict with no citations at all carries
/// the generic one.
pub fn apply_source_policy(verdict: Verdict, discovered: &[SourceRef]) -> Sources {
    match verdict {
        Verdict::Fake => Sources::not_found_fake(),
        _ if discovered.is_empty() => Sources::not_found(),
        _ => Sources::Found(discovered.to_vec()),
    }
}

/// Parse a model reply into a record, tolerating a surrounding code fence
/// but nothing else. Anything unparseable is a `MalformedOutput` error for
/// the orchestrator to convert into an ERROR record.
pub fn parse_model_verdict(
    raw: &str,
    discovered: &[SourceRef],
) -> Result<VerdictRecord, PipelineError> {
    let body = strip_fences(raw);
    let parsed: RawVerdict = serde_json::from_str(body)
        .map_err(|e| PipelineError::MalformedOutput(e.to_string()))?;
    let verdict = parse_verdict_label(&parsed.verdict)?;
    Ok(VerdictRecord {
        verdict,
        reasoning: parsed.reasoning,
        sources: apply_source_policy(verdict, discovered),
        confidence: parse_confidence(parsed.confidence.as_deref()),
        category: parsed.category,
    })
}

/// Stage 4: one final generate call, then strict parse.
pub async fn synthesize(
    client: &dyn Generator,
    claim_context: &str,
    corpus: &str,
    discovered: &[SourceRef],
) -> Result<VerdictRecord, PipelineError> {
    let out = client
        .generate(GenerateRequest::text(build_final_prompt(claim_context, corpus)))
        .await?;
    parse_model_verdict(&out.text, discovered)
}
