use crate::host::{HostMessage, HostPart};
use crate::protocol::ToolDefinition;

/// Estimate the number of tokens in `text`.
///
/// Uses a lightweight heuristic (`bytes / 4`) to avoid loading model BPE
/// tables; the pre-flight gate only needs a rough bound.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

/// Estimate the total tokens across the text parts of host messages.
///
/// Tool calls and results are not counted; the estimator mirrors what the
/// host shows as conversation text.
#[must_use]
pub fn estimate_message_tokens(messages: &[HostMessage]) -> u64 {
    let mut total = 0;
    for message in messages {
        for part in &message.parts {
            if let HostPart::Text(text) = part {
                total += estimate_tokens(text);
            }
        }
    }
    total
}

/// Estimate the tokens consumed by serialized tool definitions.
#[must_use]
pub fn estimate_tool_tokens(tools: &[ToolDefinition]) -> u64 {
    if tools.is_empty() {
        return 0;
    }
    serde_json::to_string(tools).map_or(0, |json| estimate_tokens(&json))
}
