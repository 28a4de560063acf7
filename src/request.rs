/// Request construction and validation: host messages and tool definitions
/// become an OpenAI-compatible chat-completion body, with the pre-flight
/// token gate applied before anything touches the network.
use crate::config::ProviderConfig;
use crate::error::BridgeError;
use crate::host::{HostMessage, HostPart, HostRole, ToolSpec};
use crate::models::ModelInfo;
use crate::observability::token_counter::{estimate_message_tokens, estimate_tool_tokens};
use crate::protocol::{
    AssistantToolCall, AssistantToolCallFunction, ChatMessage, ChatRequest, ChatStop,
    ToolChoice, ToolDefinition, ToolFunction,
};

/// Hard cap on tool definitions per request.
pub const MAX_TOOLS: usize = 128;

/// Host-supplied, allow-listed options for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub tools: Vec<ToolSpec>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub stop: Option<ChatStop>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
}

/// Build the wire request for one chat response.
///
/// # Errors
///
/// - [`BridgeError::InvalidRequest`] for empty messages, too many tools, or
///   a tool result with no call id.
/// - [`BridgeError::TokenLimit`] when the estimated input exceeds the
///   model's context window. Raised before any network call.
pub fn build_chat_request(
    model: &ModelInfo,
    messages: &[HostMessage],
    options: &RequestOptions,
    config: &ProviderConfig,
) -> Result<ChatRequest, BridgeError> {
    validate_request(messages, options)?;

    let wire_messages = convert_messages(messages);
    let (tools, tool_choice) = convert_tools(&options.tools);

    let input_tokens = estimate_message_tokens(messages);
    let tool_tokens = tools.as_deref().map_or(0, estimate_tool_tokens);
    let token_limit = model.max_input_tokens.max(1);
    if input_tokens + tool_tokens > token_limit {
        return Err(BridgeError::TokenLimit(format!(
            "estimated {} input tokens exceed the {} token limit of {}",
            input_tokens + tool_tokens,
            token_limit,
            model.id
        )));
    }

    let max_tokens = options
        .max_tokens
        .unwrap_or(config.defaults.max_tokens)
        .min(model.max_output_tokens.max(1));
    let temperature = options
        .temperature
        .or_else(|| config.model_temperature(&model.id))
        .unwrap_or(config.defaults.temperature);

    Ok(ChatRequest {
        model: model.id.clone(),
        messages: wire_messages,
        stream: true,
        max_tokens: Some(max_tokens),
        temperature: Some(temperature),
        frequency_penalty: options.frequency_penalty,
        presence_penalty: options.presence_penalty,
        stop: options.stop.clone(),
        tools,
        tool_choice,
    })
}

/// Validate host input before building the body.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidRequest`] on violations; see
/// [`build_chat_request`].
pub fn validate_request(
    messages: &[HostMessage],
    options: &RequestOptions,
) -> Result<(), BridgeError> {
    if messages.is_empty() {
        return Err(BridgeError::InvalidRequest(
            "at least one message is required".to_string(),
        ));
    }
    if options.tools.len() > MAX_TOOLS {
        return Err(BridgeError::InvalidRequest(format!(
            "cannot have more than {MAX_TOOLS} tools per request"
        )));
    }
    for message in messages {
        for part in &message.parts {
            if let HostPart::ToolResult { call_id, .. } = part {
                if call_id.is_empty() {
                    return Err(BridgeError::InvalidRequest(
                        "tool result is missing its call id".to_string(),
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Convert host messages into wire messages.
///
/// Text parts concatenate into the message content; assistant tool calls
/// become `tool_calls` entries; each tool result becomes its own
/// `role:"tool"` message.
#[must_use]
pub fn convert_messages(messages: &[HostMessage]) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        let role = match message.role {
            HostRole::System => "system",
            HostRole::User => "user",
            HostRole::Assistant => "assistant",
        };

        let mut text = String::new();
        let mut tool_calls: Vec<AssistantToolCall> = Vec::new();
        let mut tool_results: Vec<(String, String)> = Vec::new();

        for part in &message.parts {
            match part {
                HostPart::Text(value) => text.push_str(value),
                HostPart::ToolCall {
                    call_id,
                    name,
                    input,
                } => {
                    tool_calls.push(AssistantToolCall {
                        id: call_id.clone(),
                        type_: "function".to_string(),
                        function: AssistantToolCallFunction {
                            name: name.clone(),
                            arguments: input.to_string(),
                        },
                    });
                }
                HostPart::ToolResult { call_id, content } => {
                    tool_results.push((call_id.clone(), content.clone()));
                }
            }
        }

        if !text.is_empty() || !tool_calls.is_empty() {
            out.push(ChatMessage {
                role: role.to_string(),
                content: (!text.is_empty()).then_some(text),
                name: message.name.clone(),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            });
        }

        for (call_id, content) in tool_results {
            out.push(ChatMessage {
                role: "tool".to_string(),
                content: Some(content),
                name: None,
                tool_calls: None,
                tool_call_id: Some(call_id),
            });
        }
    }

    out
}

/// Convert host tool specs into wire tool definitions with an `auto`
/// tool choice.
#[must_use]
pub fn convert_tools(tools: &[ToolSpec]) -> (Option<Vec<ToolDefinition>>, Option<ToolChoice>) {
    if tools.is_empty() {
        return (None, None);
    }

    let definitions = tools
        .iter()
        .map(|tool| ToolDefinition {
            type_: "function".to_string(),
            function: ToolFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: Some(tool.input_schema.clone().unwrap_or_else(|| {
                    serde_json::json!({"type": "object", "properties": {}})
                })),
            },
        })
        .collect();

    (
        Some(definitions),
        Some(ToolChoice::Mode("auto".to_string())),
    )
}
