use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{BookingBuffer, ConversationMessage, ExtractedEntities, GateState, Intent};
use crate::services::ai::{LlmProvider, Message};

const SYSTEM_PROMPT: &str = r#"You are the intent classifier for a pet sitter's group chat. Messages come from customers and from the pet sitter. Classify the latest message in context of the conversation and extract booking entities.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "intent": "booking_request|booking_details|pet_sitter_confirmation|service_confirmation|final_confirmation|casual_conversation",
  "customer_name": "full name or null",
  "customer_email": "email or null",
  "customer_phone": "phone or null",
  "pets": [{"name": "Max", "species": "Dog or null", "breed": "breed or null"}],
  "service_name": "requested service like pet sitting or dog walking, or null",
  "start_date_phrase": "the date/time words exactly as written, e.g. this weekend, next Friday 9am-5pm, or null",
  "end_date_phrase": "end date/time words if given separately, or null",
  "notes": "special instructions or null",
  "confirmed": "true if the pet sitter accepts the job, false if they decline, else null",
  "reply": "a short friendly reply, or null"
}

Intent rules:
- "booking_request": a customer asks for pet care
- "booking_details": someone shares details (pets, dates, times, service, contact info, instructions)
- "pet_sitter_confirmation": the pet sitter accepts the job ("yes I can do it", "confirmed, see you then")
- "service_confirmation": the sitter confirms availability or pricing without accepting the job
- "final_confirmation": the customer acknowledges a booking that is already confirmed
- "casual_conversation": anything else

Only extract what the latest message states. Keep date phrases verbatim; do not convert them to dates.
"#;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractionError {
    #[error("LLM provider failed: {0}")]
    Provider(String),

    #[error("LLM call timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM output is not a valid extraction: {0}")]
    Unparseable(String),
}

/// What the extractor may know about the conversation besides the message.
pub struct ExtractionContext<'a> {
    pub history: &'a [ConversationMessage],
    pub sender: &'a str,
    pub today: NaiveDate,
    pub gate: GateState,
    pub buffer: &'a BookingBuffer,
}

#[async_trait]
pub trait IntentExtractor: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        context: &ExtractionContext<'_>,
    ) -> Result<ExtractedEntities, ExtractionError>;
}

pub struct LlmIntentExtractor {
    llm: Box<dyn LlmProvider>,
    timeout: Duration,
}

impl LlmIntentExtractor {
    pub fn new(llm: Box<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }
}

#[async_trait]
impl IntentExtractor for LlmIntentExtractor {
    async fn classify(
        &self,
        text: &str,
        context: &ExtractionContext<'_>,
    ) -> Result<ExtractedEntities, ExtractionError> {
        let mut messages: Vec<Message> = context.history.iter().map(Message::from).collect();
        messages.push(Message {
            role: "user".to_string(),
            content: format!("{}: {}", context.sender, text),
        });

        let system = format!("{SYSTEM_PROMPT}\n{}", describe_context(context));

        let response = tokio::time::timeout(self.timeout, self.llm.chat(&system, &messages))
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout))?
            .map_err(|e| ExtractionError::Provider(e.to_string()))?;

        parse_extraction(&response)
    }
}

fn describe_context(context: &ExtractionContext<'_>) -> String {
    let mut out = format!(
        "Today is {} ({}). Booking state: {}.",
        context.today.format("%Y-%m-%d"),
        context.today.format("%A"),
        context.gate.as_str()
    );
    let buffer = context.buffer;
    if let Some(name) = &buffer.customer_name {
        out.push_str(&format!("\nKnown customer: {name}."));
    }
    if !buffer.pets.is_empty() {
        let names: Vec<&str> = buffer.pets.iter().map(|p| p.name.as_str()).collect();
        out.push_str(&format!("\nKnown pets: {}.", names.join(", ")));
    }
    if let Some(dates) = &buffer.start_date_phrase {
        out.push_str(&format!("\nRequested dates so far: {dates}."));
    }
    out
}

pub fn parse_extraction(response: &str) -> Result<ExtractedEntities, ExtractionError> {
    // Try direct parse first
    if let Some(entities) = from_json_text(response) {
        return Ok(entities);
    }

    // Strip markdown code fences
    let cleaned = response
        .trim()
        .strip_prefix("```json")
        .or_else(|| response.trim().strip_prefix("```"))
        .unwrap_or(response.trim());
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    if let Some(entities) = from_json_text(cleaned) {
        return Ok(entities);
    }

    // Try to find a JSON object inside surrounding prose
    if let (Some(start), Some(end)) = (cleaned.find('{'), cleaned.rfind('}')) {
        if start < end {
            if let Some(entities) = from_json_text(&cleaned[start..=end]) {
                return Ok(entities);
            }
        }
    }

    tracing::warn!("failed to parse LLM response as extraction JSON");
    let preview: String = response.chars().take(120).collect();
    Err(ExtractionError::Unparseable(preview))
}

/// Accepts upper-case intent labels and pets given as bare names.
fn from_json_text(text: &str) -> Option<ExtractedEntities> {
    let mut value: serde_json::Value = serde_json::from_str(text).ok()?;
    let object = value.as_object_mut()?;

    let intent = Intent::parse(object.get("intent")?.as_str()?)?;
    object.insert("intent".to_string(), serde_json::json!(intent.as_str()));

    if let Some(pets) = object.get_mut("pets").and_then(|p| p.as_array_mut()) {
        for pet in pets.iter_mut() {
            if let Some(name) = pet.as_str() {
                *pet = serde_json::json!({ "name": name });
            }
        }
    }

    if let Some(flag) = object.get_mut("confirmed") {
        if let Some(text) = flag.as_str() {
            *flag = match text.trim().to_lowercase().as_str() {
                "true" | "yes" => serde_json::json!(true),
                "false" | "no" => serde_json::json!(false),
                _ => serde_json::Value::Null,
            };
        }
    }

    serde_json::from_value::<ExtractedEntities>(value)
        .ok()
        .map(ExtractedEntities::normalized)
}
