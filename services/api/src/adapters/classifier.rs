//! services/api/src/adapters/classifier.rs
//!
//! This module contains the adapter for the document classifier LLM.
//! It implements the `ClassifierService` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str = r#"You are a safety-training compliance assistant. You receive the text of a processed safety document (protocol, policy update, incident report) together with the known training history of each user, and you decide which safety courses the document requires for whom.

Rules:
- Only assign a course to a user if the document genuinely applies to them.
- Do NOT assign a course that already appears in the user's "assigned_courses" list, UNLESS it also appears in their "renewable_courses" list (those have expired and may be offered again). Courses you decline for this reason go into "skipped_duplicates".
- For every course you assign, state the renewal period in months, the completion deadline in days, and a priority of "normal", "high", or "critical".
- Users not mentioned in the history may still receive assignments if the document applies to them.

Respond with a single JSON object and nothing else, in exactly this shape:
{
  "assignments": [
    {
      "user_id": "<id>",
      "courses_assigned": ["<course id>", ...],
      "reason": "<one sentence>",
      "course_periods": [
        {"course_id": "<course id>", "months": 12, "deadline_days": 30, "priority": "normal"}
      ]
    }
  ],
  "skipped_duplicates": [
    {"user_id": "<id>", "name": "", "skipped_courses": ["<course id>", ...], "reason": "<why>"}
  ]
}

Omit users with nothing to assign and nothing skipped. Use empty arrays rather than omitting the top-level keys."#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use regex::Regex;
use training_tracker_core::ports::{
    ClassifierOutcome, ClassifierService, HistoryContext, PortError, PortResult,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ClassifierService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiClassifierAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClassifierAdapter {
    /// Creates a new `OpenAiClassifierAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Models occasionally wrap their JSON in a markdown code fence despite
    /// the instructions; unwrap it before parsing.
    fn extract_json(raw: &str) -> &str {
        let fence = Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap();
        match fence.captures(raw) {
            Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(raw),
            None => raw.trim(),
        }
    }
}

//=========================================================================================
// `ClassifierService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ClassifierService for OpenAiClassifierAdapter {
    /// Decides which courses the document requires, given per-user history.
    async fn classify_document(
        &self,
        document_text: &str,
        history: &HistoryContext,
    ) -> PortResult<ClassifierOutcome> {
        let history_json = serde_json::to_string_pretty(history)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!(
                    "KNOWN TRAINING HISTORY:\n{}\n\nDOCUMENT:\n{}",
                    history_json, document_text
                ))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(
                    "Classifier LLM response contained no text content.".to_string(),
                )
            })?;

        let payload = Self::extract_json(&content);
        serde_json::from_str(payload).map_err(|e| {
            PortError::Unexpected(format!("Classifier returned unparseable JSON: {}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_unwraps_markdown_fences() {
        let fenced = "```json\n{\"assignments\": []}\n```";
        assert_eq!(
            OpenAiClassifierAdapter::extract_json(fenced),
            "{\"assignments\": []}"
        );

        let bare = "  {\"assignments\": []}  ";
        assert_eq!(
            OpenAiClassifierAdapter::extract_json(bare),
            "{\"assignments\": []}"
        );
    }

    #[test]
    fn classifier_outcome_parses_the_documented_shape() {
        let raw = r#"{
            "assignments": [
                {
                    "user_id": "U1",
                    "courses_assigned": ["LAB-SAFETY-101"],
                    "reason": "handles solvents",
                    "course_periods": [
                        {"course_id": "LAB-SAFETY-101", "months": 12, "deadline_days": 30, "priority": "critical"}
                    ]
                }
            ],
            "skipped_duplicates": [
                {"user_id": "U2", "name": "Sam", "skipped_courses": ["LAB-SAFETY-101"], "reason": "already assigned"}
            ]
        }"#;

        let outcome: ClassifierOutcome = serde_json::from_str(raw).unwrap();
        assert_eq!(outcome.assignments.len(), 1);
        assert_eq!(outcome.assignments[0].course_periods[0].months, 12);
        assert_eq!(outcome.skipped_duplicates[0].user_id, "U2");
    }
}
