// src/search.rs
use std::collections::HashSet;

use futures::{stream, FutureExt, StreamExt};

use crate::genai::{GenerateRequest, Generator};
use crate::pipeline::PipelineError;
use crate::types::{EvidenceItem, SourceRef};

/// Corpus sentinel for runs where grounding produced nothing (no claim
/// text, empty query plan, or zero usable answers).
pub const NO_WEB_EVIDENCE: &str = "No web evidence was gathered.";

/// Everything stage 3 hands to the synthesizer: per-query evidence in
/// query order, the concatenated corpus, and deduplicated citations in
/// discovery order.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub items: Vec<EvidenceItem>,
    pub corpus: String,
    pub discovered: Vec<SourceRef>,
}

/// Stage 3: run each query through a grounded generate call. Queries are
/// independent, so they fan out with bounded concurrency and are
/// reassembled in plan order. A failed query is logged and skipped; the
/// stage itself fails only when every query failed.
pub async fn gather_evidence(
    client: &dyn Generator,
    queries: &[String],
    concurrency: usize,
) -> Result<SearchOutcome, PipelineError> {
    let tasks: Vec<_> = queries
        .iter()
        .enumerate()
        .map(|(idx, q)| {
            async move {
                let res = client.generate(GenerateRequest::text(q.clone()).grounded()).await;
                (idx, q.clone(), res)
            }
            .boxed()
        })
        .collect();

    let mut done = stream::iter(tasks)
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;
    done.sort_by_key(|(idx, ..)| *idx);

    let mut items = Vec::with_capacity(queries.len());
    let mut failed = 0usize;
    let mut last_err = String::new();
    for (_, query, res) in done {
        match res {
            Ok(gen) => items.push(EvidenceItem {
                query,
                evidence: gen.text,
                sources: gen.citations,
            }),
            Err(e) => {
                tracing::warn!(%query, error = %e, "grounded search failed; continuing");
                failed += 1;
                last_err = e.to_string();
            }
        }
    }

    if !queries.is_empty() && items.is_empty() {
        return Err(PipelineError::UpstreamCall(format!(
            "all {failed} grounded searches failed; last error: {last_err}"
        )));
    }

    let mut corpus = String::new();
    let mut seen = HashSet::new();
    let mut discovered = Vec::new();
    for item in &items {
        corpus.push_str(&format!(
            "\n--- Evidence for {} ---\n{}\n",
            item.query, item.evidence
        ));
        for src in &item.sources {
            if seen.insert(src.uri.clone()) {
                discovered.push(src.clone());
            }
        }
    }

    Ok(SearchOutcome { items, corpus, discovered })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genai::{GenAiError, Generated};
    use tokio::time::{sleep, Duration};

    struct StaggeredSearch;

    #[async_trait::async_trait]
    impl Generator for StaggeredSearch {
        async fn generate(&self, req: GenerateRequest) -> Result<Generated, GenAiError> {
            assert!(req.grounded);
            // Later queries finish first, so order must come from reassembly.
            let delay = match req.text.as_str() {
                "q0" => 30,
                "q1" => 15,
                _ => 1,
            };
            sleep(Duration::from_millis(delay)).await;
            Ok(Generated {
                text: format!("evidence for {}", req.text),
                citations: vec![SourceRef {
                    uri: format!("https://example.org/{}", req.text),
                    title: None,
                }],
            })
        }
    }

    struct FlakySearch;

    #[async_trait::async_trait]
    impl Generator for FlakySearch {
        async fn generate(&self, req: GenerateRequest) -> Result<Generated, GenAiError> {
            if req.text == "bad" {
                return Err(GenAiError::EmptyResponse);
            }
            Ok(Generated {
                text: "ok".into(),
                citations: vec![
                    SourceRef { uri: "https://dup".into(), title: Some("first".into()) },
                    SourceRef { uri: "https://dup".into(), title: Some("second".into()) },
                ],
            })
        }
    }

    struct DeadSearch;

    #[async_trait::async_trait]
    impl Generator for DeadSearch {
        async fn generate(&self, _req: GenerateRequest) -> Result<Generated, GenAiError> {
            Err(GenAiError::EmptyResponse)
        }
    }

    #[tokio::test]
    async fn results_come_back_in_query_order() {
        let queries: Vec<String> = vec!["q0".into(), "q1".into(), "q2".into()];
        let out = gather_evidence(&StaggeredSearch, &queries, 3).await.unwrap();
        let got: Vec<_> = out.items.iter().map(|i| i.query.as_str()).collect();
        assert_eq!(got, vec!["q0", "q1", "q2"]);
        let c0 = out.corpus.find("Evidence for q0").unwrap();
        let c2 = out.corpus.find("Evidence for q2").unwrap();
        assert!(c0 < c2);
    }

    #[tokio::test]
    async fn discovered_urls_are_deduplicated() {
        let queries: Vec<String> = vec!["a".into(), "b".into()];
        let out = gather_evidence(&FlakySearch, &queries, 2).await.unwrap();
        assert_eq!(out.discovered.len(), 1);
        // first discovery wins
        assert_eq!(out.discovered[0].title.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn one_failed_query_does_not_sink_the_stage() {
        let queries: Vec<String> = vec!["good".into(), "bad".into(), "also good".into()];
        let out = gather_evidence(&FlakySearch, &queries, 2).await.unwrap();
        assert_eq!(out.items.len(), 2);
        assert!(!out.corpus.contains("Evidence for bad"));
    }

    #[tokio::test]
    async fn all_failures_fail_the_stage() {
        let queries: Vec<String> = vec!["x".into(), "y".into()];
        let err = gather_evidence(&DeadSearch, &queries, 2).await.unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamCall(_)));
    }

    #[tokio::test]
    async fn empty_plan_is_an_empty_outcome() {
        let out = gather_evidence(&DeadSearch, &[], 2).await.unwrap();
        assert!(out.items.is_empty());
        assert!(out.corpus.is_empty());
        assert!(out.discovered.is_empty());
    }
}
