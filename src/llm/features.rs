//! Visual feature extraction: photos in, best-effort JSON object out.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::llm::media::ImagePayload;
use crate::llm::openai::{ChatRequest, LlmError, ModelClient};

const FEATURE_SCHEMA: &str = r#"{
  "condition": "string: overall state of the property (e.g. new renovation, good, needs repair)",
  "furniture": ["string: furniture visible on the photos"],
  "appliances": ["string: appliances and equipment visible on the photos"],
  "standout_features": ["string: what makes the property attractive"],
  "possible_drawbacks": ["string: visible issues a buyer or tenant would notice"],
  "confidence": "string: low | medium | high"
}"#;

const FEATURE_SYSTEM_PROMPT: &str = "You are a meticulous real-estate photo analyst. \
You look at listing photos and describe only what is actually visible: renovation state, \
furniture, appliances, bathroom, kitchen, flooring, windows and view, building and entrance. \
Never guess facts that are not visible. \
Reply with a single JSON object and nothing else: no Markdown, no code fences, no comments.";

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureExtraction {
    Parsed {
        features: Map<String, Value>,
        /// The object had to be cut out of surrounding text.
        recovered: bool,
    },
    Empty {
        reason: String,
    },
}

impl FeatureExtraction {
    fn empty(reason: impl Into<String>) -> Self {
        FeatureExtraction::Empty {
            reason: reason.into(),
        }
    }

    /// The feature object; `{}` when nothing could be parsed.
    pub fn features(&self) -> Map<String, Value> {
        match self {
            FeatureExtraction::Parsed { features, .. } => features.clone(),
            FeatureExtraction::Empty { .. } => Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FeatureExtraction::Empty { .. })
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Parses a model reply as a JSON object: first as-is, then the slice from
/// the first `{` to the last `}`. Never fails.
pub fn parse_features(raw: &str) -> FeatureExtraction {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FeatureExtraction::empty("empty response");
    }

    if let Some(features) = parse_object(trimmed) {
        return FeatureExtraction::Parsed {
            features,
            recovered: false,
        };
    }

    let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) else {
        return FeatureExtraction::empty("no JSON object in response");
    };
    if start >= end {
        return FeatureExtraction::empty("no JSON object in response");
    }

    match parse_object(&trimmed[start..=end]) {
        Some(features) => FeatureExtraction::Parsed {
            features,
            recovered: true,
        },
        None => FeatureExtraction::empty("response is not valid JSON"),
    }
}

pub fn build_feature_request(model: &str, images: Vec<ImagePayload>) -> ChatRequest {
    let user_text = format!(
        "Analyze these {} listing photo(s). Return strictly one JSON object with this schema:\n{}\n\
         Use empty lists when nothing applies.",
        images.len(),
        FEATURE_SCHEMA
    );
    ChatRequest {
        operation: "extract_features",
        model: model.to_string(),
        system_prompt: FEATURE_SYSTEM_PROMPT.to_string(),
        user_text,
        images,
        temperature: 0.2,
        json_output: true,
    }
}

/// Calls the vision model once. Transport and HTTP failures propagate;
/// a malformed reply only degrades to an empty feature object.
pub async fn extract_features<M: ModelClient>(
    client: &M,
    model: &str,
    images: Vec<ImagePayload>,
) -> Result<FeatureExtraction, LlmError> {
    let image_count = images.len();
    let raw = client
        .complete(build_feature_request(model, images))
        .await?
        .unwrap_or_default();

    let extraction = parse_features(&raw);
    match &extraction {
        FeatureExtraction::Parsed { features, recovered } => info!(
            "Extracted {} feature field(s) from {} photo(s) (recovered={})",
            features.len(),
            image_count,
            recovered
        ),
        FeatureExtraction::Empty { reason } => {
            warn!("Feature extraction fell back to an empty object: {reason}")
        }
    }
    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json() {
        let extraction = parse_features(r#"{"condition":"good","furniture":["sofa"]}"#);
        match extraction {
            FeatureExtraction::Parsed { features, recovered } => {
                assert!(!recovered);
                assert_eq!(features["condition"], "good");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn recovers_object_wrapped_in_prose() {
        let raw = "Sure! Here it is:\n```json\n{\"condition\": \"needs repair\"}\n```\nAnything else?";
        match parse_features(raw) {
            FeatureExtraction::Parsed { features, recovered } => {
                assert!(recovered);
                assert_eq!(features["condition"], "needs repair");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_json_yields_empty_object() {
        let extraction = parse_features("I cannot analyze these photos.");
        assert!(extraction.is_empty());
        assert!(extraction.features().is_empty());
    }

    #[test]
    fn broken_json_between_braces_yields_empty_object() {
        assert!(parse_features("{ condition: good, }").is_empty());
        assert!(parse_features("} reversed {").is_empty());
        assert!(parse_features("   ").is_empty());
    }

    #[test]
    fn arrays_are_not_feature_objects() {
        assert!(parse_features(r#"["sofa", "tv"]"#).is_empty());
    }

    #[test]
    fn request_asks_for_json_with_all_images() {
        let images = vec![
            ImagePayload::new(vec![1], "image/jpeg"),
            ImagePayload::new(vec![2], "image/png"),
        ];
        let request = build_feature_request("vision-model", images);
        assert!(request.json_output);
        assert_eq!(request.images.len(), 2);
        assert!(request.user_text.contains("possible_drawbacks"));
        assert!(request.user_text.contains("2 listing photo(s)"));
    }
}
