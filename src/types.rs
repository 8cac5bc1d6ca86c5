use serde::{Deserialize, Serialize};

/// Sentinel used when grounding produced no citations for a claim.
pub const SOURCES_NOT_FOUND: &str = "Source not found";
/// Sentinel used under the no-sources-on-fake policy: a FAKE verdict never
/// carries a URL, only this marker.
pub const SOURCES_NOT_FOUND_FAKE: &str = "Not found (claim judged fake)";

/// One web citation attached by the grounded search service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Evidence gathered for a single search query, in query order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub query: String,
    pub evidence: String,
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Fact,
    Fake,
    Unverified,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Either a list of grounded citations or a not-found marker. Serialized
/// untagged so the wire shape matches the original contract: a JSON array
/// of sources, or a plain sentinel string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sources {
    NotFound(String),
    Found(Vec<SourceRef>),
}

impl Sources {
    pub fn not_found() -> Self {
        Sources::NotFound(SOURCES_NOT_FOUND.to_string())
    }

    pub fn not_found_fake() -> Self {
        Sources::NotFound(SOURCES_NOT_FOUND_FAKE.to_string())
    }
}

/// Final structured output of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerdictRecord {
    pub verdict: Verdict,
    pub reasoning: String,
    pub sources: Sources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub category: String,
}

impl VerdictRecord {
    /// ERROR record for a failed run. Reserved for failure paths; never
    /// paired with a success status.
    pub fn failure(reasoning: impl Into<String>) -> Self {
        VerdictRecord {
            verdict: Verdict::Error,
            reasoning: reasoning.into(),
            sources: Sources::Found(Vec::new()),
            confidence: None,
            category: String::new(),
        }
    }
}

/// Uploaded image bytes plus the sniffed mime type. Lives only for the
/// duration of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct MediaAttachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// One analysis request: a text claim, an image, or both.
#[derive(Debug, Clone, Default)]
pub struct AnalysisInput {
    pub claim: Option<String>,
    pub image: Option<MediaAttachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_labels_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&Verdict::Fact).unwrap(), "\"FACT\"");
        assert_eq!(serde_json::to_string(&Verdict::Fake).unwrap(), "\"FAKE\"");
        assert_eq!(serde_json::to_string(&Confidence::Medium).unwrap(), "\"MEDIUM\"");
    }

    #[test]
    fn record_uses_type_key_and_drops_absent_confidence() {
        let rec = VerdictRecord::failure("upstream exploded");
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["verdict"], "ERROR");
        assert!(v.get("confidence").is_none());
        assert!(v.get("type").is_none());

        let rec = VerdictRecord {
            verdict: Verdict::Fact,
            reasoning: "ok".into(),
            sources: Sources::Found(vec![SourceRef { uri: "https://a".into(), title: None }]),
            confidence: Some(Confidence::High),
            category: "Authentic".into(),
        };
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["type"], "Authentic");
        assert_eq!(v["sources"][0]["uri"], "https://a");
    }

    #[test]
    fn sources_sentinel_serializes_as_plain_string() {
        let v = serde_json::to_value(Sources::not_found_fake()).unwrap();
        assert_eq!(v, serde_json::json!(SOURCES_NOT_FOUND_FAKE));
    }
}
