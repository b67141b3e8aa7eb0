use serde_json::{Map, Value};

use crate::flow::metadata::MetadataField;
use crate::flow::session::{DealType, Language, ListingPayload};
use crate::llm::openai::{ChatRequest, LlmError, ModelClient};

const PLACEHOLDER: &str = "not specified";

const LISTING_SYSTEM_PROMPT: &str = "You are an expert real-estate agent in Novi Sad, Serbia, \
and an experienced listing editor and marketer.
- Write listings that hook the reader in the first two lines.
- Be brief, concrete and persuasive: numbers and facts, no filler.
- Never invent facts that are not in the metadata or the photo analysis.
- If the photo analysis contradicts the metadata, trust the metadata and skip the doubtful detail.
- \"36m\", \"36 sq m\", \"36 кв м\" all mean 36 square meters of area.
- If an address or street is given, mention the nearby infrastructure only when it is well known.
- Plain text only: no Markdown, no asterisks.";

fn body_length(deal: DealType) -> &'static str {
    match deal {
        DealType::Sale => "800-1200 characters",
        DealType::Rent => "500-800 characters",
        DealType::Presentation => "1200-1800 characters",
    }
}

fn deal_description(deal: DealType) -> &'static str {
    match deal {
        DealType::Sale => "sale listing",
        DealType::Rent => "long-term rental listing",
        DealType::Presentation => "property presentation (no price pressure, focus on the lifestyle)",
    }
}

fn contact_fallback(language: Language) -> &'static str {
    match language {
        Language::Ru => "Пишите в личные сообщения: отвечу на вопросы и организую просмотр.",
        Language::En => "Send a direct message to ask questions or book a viewing.",
        Language::Sr => "Pišite u privatne poruke za pitanja i zakazivanje razgledanja.",
    }
}

fn or_placeholder(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        PLACEHOLDER
    } else {
        trimmed
    }
}

pub fn serialize_metadata(payload: &ListingPayload) -> String {
    let mut lines: Vec<String> = MetadataField::ALL
        .into_iter()
        .map(|field| format!("{}: {}", field.title(), or_placeholder(field.value(payload))))
        .collect();
    lines.push(format!(
        "Original notes from the agent:\n{}",
        or_placeholder(&payload.raw_metadata)
    ));
    lines.join("\n")
}

pub fn serialize_features(features: &Map<String, Value>) -> String {
    if features.is_empty() {
        return "(no photo analysis available; rely on the metadata)".to_string();
    }
    serde_json::to_string_pretty(&Value::Object(features.clone())).unwrap_or_else(|_| "{}".to_string())
}

/// Builds the user instruction for the text model.
pub fn build_listing_prompt(payload: &ListingPayload, features: &Map<String, Value>) -> String {
    let deal = payload.deal_type.unwrap_or(DealType::Sale);
    let language = payload.language.unwrap_or(Language::Ru);
    let contact = payload.contact.trim();
    let call_to_action = if contact.is_empty() {
        format!("no contact was given, end with this phrase: \"{}\"", contact_fallback(language))
    } else {
        format!("invite the reader to get in touch via {contact}")
    };

    format!(
        "Write a {deal_description} in {language_name}.\n\n\
         Listing metadata:\n{metadata}\n\n\
         Photo analysis (JSON):\n{features}\n\n\
         Output structure, exactly these six parts in this order:\n\
         1) Headline options: 3 variants, each with deal type, area and district or street.\n\
         2) Pros: 3-5 short bullet points.\n\
         3) Cons: 1-3 honest points, softened but not hidden.\n\
         4) Listing text of {body_length}: layout, condition, furniture and appliances, \
         communications, floor, location, terms (price, availability).\n\
         5) Hashtags: 5-8 hashtags in {language_name}.\n\
         6) Call to action: {call_to_action}\n\n\
         Write everything in {language_name}.",
        deal_description = deal_description(deal),
        language_name = language.english_name(),
        metadata = serialize_metadata(payload),
        features = serialize_features(features),
        body_length = body_length(deal),
        call_to_action = call_to_action,
    )
}

pub fn build_listing_request(
    model: &str,
    temperature: f32,
    payload: &ListingPayload,
    features: &Map<String, Value>,
) -> ChatRequest {
    ChatRequest {
        operation: "compose_listing",
        model: model.to_string(),
        system_prompt: LISTING_SYSTEM_PROMPT.to_string(),
        user_text: build_listing_prompt(payload, features),
        images: Vec::new(),
        temperature,
        json_output: false,
    }
}

/// One blocking text-model call; an absent response becomes an empty string.
pub async fn compose_listing<M: ModelClient>(
    client: &M,
    model: &str,
    temperature: f32,
    payload: &ListingPayload,
    features: &Map<String, Value>,
) -> Result<String, LlmError> {
    let request = build_listing_request(model, temperature, payload, features);
    Ok(client.complete(request).await?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn payload() -> ListingPayload {
        ListingPayload {
            deal_type: Some(DealType::Rent),
            language: Some(Language::En),
            address: "Main St 1".to_string(),
            area: "50".to_string(),
            raw_metadata: "Address: Main St 1\nArea: 50".to_string(),
            ..ListingPayload::default()
        }
    }

    #[test]
    fn absent_fields_get_a_placeholder() {
        let text = serialize_metadata(&payload());
        assert!(text.contains("Address: Main St 1"));
        assert!(text.contains("Area (m²): 50"));
        assert!(text.contains("Price: not specified"));
        assert!(text.contains("Contact: not specified"));
    }

    #[test]
    fn prompt_carries_deal_language_and_structure() {
        let features = json!({ "condition": "new renovation" });
        let prompt = build_listing_prompt(&payload(), features.as_object().unwrap());
        assert!(prompt.contains("long-term rental listing in English"));
        assert!(prompt.contains("500-800 characters"));
        assert!(prompt.contains("\"condition\": \"new renovation\""));
        for part in ["1) Headline", "2) Pros", "3) Cons", "4) Listing text", "5) Hashtags", "6) Call to action"] {
            assert!(prompt.contains(part), "missing {part}");
        }
        assert!(prompt.contains("Send a direct message"));
    }

    #[test]
    fn contact_replaces_fallback_phrase() {
        let mut payload = payload();
        payload.contact = "+381 60 000 0000".to_string();
        let prompt = build_listing_prompt(&payload, &Map::new());
        assert!(prompt.contains("get in touch via +381 60 000 0000"));
        assert!(!prompt.contains("Send a direct message"));
    }

    #[test]
    fn empty_features_and_choices_still_build_a_prompt() {
        let prompt = build_listing_prompt(&ListingPayload::default(), &Map::new());
        assert!(prompt.contains("sale listing in Russian"));
        assert!(prompt.contains("no photo analysis available"));
        assert!(prompt.contains("Пишите в личные сообщения"));
    }
}
