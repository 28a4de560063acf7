use serde::{Deserialize, Serialize};

/// Chat Completions request wire type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<ChatStop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
}

/// `stop` field in chat requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatStop {
    Single(String),
    Multi(Vec<String>),
}

/// `tool_choice` field in chat requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Mode(String),
    Function(ToolChoiceFunction),
}

/// `tool_choice` object form selecting one function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    #[serde(rename = "type")]
    pub type_: String,
    pub function: ToolChoiceFunctionName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoiceFunctionName {
    pub name: String,
}

/// A message in the request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<AssistantToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// A completed tool call on an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub function: AssistantToolCallFunction,
}

/// The function part of a completed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantToolCallFunction {
    pub name: String,
    pub arguments: String,
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub type_: String,
    pub function: ToolFunction,
}

/// A function declaration within a tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Streaming response wire types
// ---------------------------------------------------------------------------

/// One parsed SSE chunk payload. Only the first choice is meaningful.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A choice within a stream chunk.
///
/// Some backends attach the reasoning payload to the choice rather than the
/// delta; both spots are read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: StreamDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingDelta>,
}

/// Delta content within a stream choice.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(
        default,
        alias = "reasoning",
        alias = "reasoning_content",
        skip_serializing_if = "Option::is_none"
    )]
    pub thinking: Option<ThinkingDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<StreamToolCall>>,
}

/// Explicit reasoning payload, streamed either as a bare string or as an
/// object carrying an id and opaque metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThinkingDelta {
    Text(String),
    Segment {
        #[serde(default)]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

impl ThinkingDelta {
    /// Decompose into `(text, id, metadata)`, dropping empty text.
    #[must_use]
    pub fn into_parts(self) -> (Option<String>, Option<String>, Option<serde_json::Value>) {
        match self {
            ThinkingDelta::Text(text) => {
                if text.is_empty() {
                    (None, None, None)
                } else {
                    (Some(text), None, None)
                }
            }
            ThinkingDelta::Segment { text, id, metadata } => {
                (text.filter(|t| !t.is_empty()), id, metadata)
            }
        }
    }
}

/// A fragmentary tool call inside a stream delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<StreamToolCallFunction>,
}

/// Function fragment within a streaming tool call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Token usage reported by the upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// Model listing wire types
// ---------------------------------------------------------------------------

/// Response envelope for `GET {base_url}/models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub data: Vec<ModelsItem>,
}

/// A single entry in the models listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsItem {
    pub id: String,
}

/// One provider's subtree of the supplementary model-details document.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDetailsProvider {
    #[serde(default)]
    pub models: rustc_hash::FxHashMap<String, ModelDevDetails>,
}

/// Supplementary per-model details from the models.dev-style document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelDevDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub reasoning: bool,
    #[serde(default)]
    pub tool_call: bool,
    #[serde(default)]
    pub modalities: Option<ModelModalities>,
    #[serde(default)]
    pub limit: Option<ModelLimits>,
}

/// Input/output modality lists for a model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelModalities {
    #[serde(default)]
    pub input: Vec<String>,
    #[serde(default)]
    pub output: Vec<String>,
}

/// Context/output token limits for a model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelLimits {
    #[serde(default)]
    pub context: Option<u64>,
    #[serde(default)]
    pub output: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_delta_chunk() {
        let chunk: ChatStreamChunk = serde_json::from_str(
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Hi"},"finish_reason":null}]}"#,
        )
        .unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hi"));
        assert!(chunk.choices[0].finish_reason.is_none());
    }

    #[test]
    fn test_parse_tool_call_delta_without_index() {
        let chunk: ChatStreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{"tool_calls":[{"id":"call_1","function":{"name":"lookup","arguments":""}}]}}]}"#,
        )
        .unwrap();
        let calls = chunk.choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].index, None);
        assert_eq!(calls[0].id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_parse_reasoning_aliases() {
        for field in ["thinking", "reasoning", "reasoning_content"] {
            let raw = format!(r#"{{"choices":[{{"delta":{{"{field}":"pondering"}}}}]}}"#);
            let chunk: ChatStreamChunk = serde_json::from_str(&raw).unwrap();
            let (text, id, _) = chunk.choices[0]
                .delta
                .thinking
                .clone()
                .expect("thinking field")
                .into_parts();
            assert_eq!(text.as_deref(), Some("pondering"), "field {field}");
            assert!(id.is_none());
        }
    }

    #[test]
    fn test_parse_thinking_object_on_choice() {
        let chunk: ChatStreamChunk = serde_json::from_str(
            r#"{"choices":[{"delta":{},"thinking":{"text":"hmm","id":"t1","metadata":{"depth":2}}}]}"#,
        )
        .unwrap();
        let (text, id, metadata) = chunk.choices[0]
            .thinking
            .clone()
            .expect("thinking on choice")
            .into_parts();
        assert_eq!(text.as_deref(), Some("hmm"));
        assert_eq!(id.as_deref(), Some("t1"));
        assert!(metadata.is_some());
    }

    #[test]
    fn test_serialize_request_omits_unset_fields() {
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some("hello".to_string()),
                name: None,
                tool_calls: None,
                tool_call_id: None,
            }],
            stream: true,
            max_tokens: Some(64),
            temperature: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop: None,
            tools: None,
            tool_choice: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""stream":true"#));
        assert!(!json.contains("temperature"));
        assert!(!json.contains("tool_choice"));
    }
}
