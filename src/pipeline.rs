// src/pipeline.rs
use crate::genai::{GenAiError, Generator};
use crate::search::{self, SearchOutcome, NO_WEB_EVIDENCE};
use crate::types::{AnalysisInput, VerdictRecord};
use crate::{queries, verdict, vision};

/// Interpolated into the final prompt when the request carried no claim
/// text (image-only runs).
pub const NO_TEXT_CLAIM: &str = "No text claim was provided.";

/// Request-scoped failure taxonomy. Input errors are rejected before any
/// remote call; the other two short-circuit the run and become an ERROR
/// record at the serving boundary. Nothing here crashes the process.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Input(String),
    #[error("upstream call failed: {0}")]
    UpstreamCall(String),
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

impl From<GenAiError> for PipelineError {
    fn from(e: GenAiError) -> Self {
        PipelineError::UpstreamCall(e.to_string())
    }
}

/// Run the four stages in order: DescribeVisual, PlanQueries,
/// GroundAndCollect, Synthesize. A stage is skipped only when its required
/// input is absent, with sentinels keeping downstream prompts well-formed.
/// Any stage failure aborts the run; no retries, no partial results.
pub async fn run(
    client: &dyn Generator,
    input: &AnalysisInput,
    search_concurrency: usize,
) -> Result<VerdictRecord, PipelineError> {
    let claim = input
        .claim
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if claim.is_none() && input.image.is_none() {
        return Err(PipelineError::Input(
            "provide a text claim, an image, or both".into(),
        ));
    }

    let visual_evidence = vision::describe_media(client, input.image.as_ref()).await?;
    tracing::debug!(skipped = input.image.is_none(), "visual analysis done");

    let outcome = match claim {
        Some(c) => {
            let plan = queries::plan_queries(client, c, &visual_evidence).await?;
            tracing::info!(queries = plan.len(), "query plan generated");
            search::gather_evidence(client, &plan, search_concurrency).await?
        }
        None => SearchOutcome::default(),
    };

    let claim_context = format!(
        "Text Claim: {}\nVisual Context: {}",
        claim.unwrap_or(NO_TEXT_CLAIM),
        visual_evidence
    );
    let corpus = if outcome.corpus.is_empty() {
        NO_WEB_EVIDENCE
    } else {
        outcome.corpus.as_str()
    };

    let record = verdict::synthesize(client, &claim_context, corpus, &outcome.discovered).await?;
    tracing::info!(verdict = ?record.verdict, sources = outcome.discovered.len(), "analysis complete");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genai::{GenerateRequest, Generated};
    use crate::types::{MediaAttachment, SourceRef, Sources, Verdict};
    use crate::vision::VISUAL_ANALYSIS_SKIPPED;
    use std::sync::Mutex;

    const FINAL_OK: &str = r#"{"verdict": "FACT", "reasoning": "official notification exists", "confidence": "HIGH", "type": "election notification"}"#;

    /// Routes each call on the request shape and records the stage order.
    struct ScriptedGen {
        plan_reply: &'static str,
        fail_grounded: bool,
        final_reply: &'static str,
        calls: Mutex<Vec<&'static str>>,
        last_final_prompt: Mutex<String>,
    }

    impl ScriptedGen {
        fn new() -> Self {
            ScriptedGen {
                plan_reply: "q one\nq two\nq three",
                fail_grounded: false,
                final_reply: FINAL_OK,
                calls: Mutex::new(Vec::new()),
                last_final_prompt: Mutex::new(String::new()),
            }
        }

        fn stages(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Generator for ScriptedGen {
        async fn generate(&self, req: GenerateRequest) -> Result<Generated, GenAiError> {
            if req.image.is_some() {
                self.calls.lock().unwrap().push("vision");
                return Ok(Generated { text: "photo of a podium".into(), citations: vec![] });
            }
            if req.grounded {
                self.calls.lock().unwrap().push("search");
                if self.fail_grounded {
                    return Err(GenAiError::EmptyResponse);
                }
                return Ok(Generated {
                    text: format!("grounded answer to {}", req.text),
                    citations: vec![SourceRef {
                        uri: "https://eci.gov.in/press".into(),
                        title: Some("ECI press note".into()),
                    }],
                });
            }
            if req.text.contains("Return ONLY the queries") {
                self.calls.lock().unwrap().push("plan");
                return Ok(Generated { text: self.plan_reply.into(), citations: vec![] });
            }
            self.calls.lock().unwrap().push("final");
            *self.last_final_prompt.lock().unwrap() = req.text.clone();
            Ok(Generated { text: self.final_reply.into(), citations: vec![] })
        }
    }

    fn png() -> MediaAttachment {
        MediaAttachment::from_bytes(b"\x89PNG\r\n\x1a\npixels".to_vec()).unwrap()
    }

    #[tokio::test]
    async fn empty_request_is_rejected_before_any_call() {
        let gen = ScriptedGen::new();
        let err = run(&gen, &AnalysisInput::default(), 4).await.unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
        assert!(gen.stages().is_empty());

        let blank = AnalysisInput { claim: Some("   ".into()), image: None };
        let err = run(&gen, &blank, 4).await.unwrap_err();
        assert!(matches!(err, PipelineError::Input(_)));
        assert!(gen.stages().is_empty());
    }

    #[tokio::test]
    async fn text_only_runs_all_web_stages_and_skips_vision() {
        let gen = ScriptedGen::new();
        let input = AnalysisInput {
            claim: Some("Election postponed indefinitely".into()),
            image: None,
        };
        let rec = run(&gen, &input, 4).await.unwrap();
        assert_eq!(rec.verdict, Verdict::Fact);
        assert_eq!(
            rec.sources,
            Sources::Found(vec![SourceRef {
                uri: "https://eci.gov.in/press".into(),
                title: Some("ECI press note".into()),
            }])
        );
        assert_eq!(gen.stages(), vec!["plan", "search", "search", "search", "final"]);
        let prompt = gen.last_final_prompt.lock().unwrap().clone();
        assert!(prompt.contains(VISUAL_ANALYSIS_SKIPPED));
        assert!(prompt.contains("grounded answer to q one"));
    }

    #[tokio::test]
    async fn image_only_skips_planning_and_search() {
        let gen = ScriptedGen::new();
        let input = AnalysisInput { claim: None, image: Some(png()) };
        let rec = run(&gen, &input, 4).await.unwrap();
        assert_eq!(rec.verdict, Verdict::Fact);
        assert_eq!(gen.stages(), vec!["vision", "final"]);
        let prompt = gen.last_final_prompt.lock().unwrap().clone();
        assert!(prompt.contains(NO_TEXT_CLAIM));
        assert!(prompt.contains(NO_WEB_EVIDENCE));
        assert!(prompt.contains("photo of a podium"));
    }

    #[tokio::test]
    async fn empty_query_plan_still_reaches_synthesis() {
        let mut gen = ScriptedGen::new();
        gen.plan_reply = "\n  \n";
        gen.final_reply = r#"{"verdict": "UNVERIFIED", "reasoning": "no evidence gathered", "confidence": "LOW", "type": "general"}"#;
        let input = AnalysisInput { claim: Some("something obscure".into()), image: None };
        let rec = run(&gen, &input, 4).await.unwrap();
        assert_eq!(rec.verdict, Verdict::Unverified);
        assert_eq!(gen.stages(), vec!["plan", "final"]);
    }

    #[tokio::test]
    async fn search_stage_failure_aborts_the_run() {
        let mut gen = ScriptedGen::new();
        gen.fail_grounded = true;
        let input = AnalysisInput { claim: Some("claim".into()), image: None };
        let err = run(&gen, &input, 4).await.unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamCall(_)));
        assert!(!err.to_string().is_empty());
        assert!(!gen.stages().contains(&"final"));
    }

    #[tokio::test]
    async fn malformed_final_reply_surfaces_as_typed_error() {
        let mut gen = ScriptedGen::new();
        gen.final_reply = "I think it is probably true!";
        let input = AnalysisInput { claim: Some("claim".into()), image: None };
        let err = run(&gen, &input, 4).await.unwrap_err();
        assert!(matches!(err, PipelineError::MalformedOutput(_)));
    }
}
