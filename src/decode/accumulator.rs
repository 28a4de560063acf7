/// Structured tool-call delta accumulator.
///
/// Merges fragmentary `tool_calls` deltas (arriving by integer index, with
/// separately-streamed id / name / argument substrings) into complete tool
/// invocations. A call is emitted as soon as its name is known and its
/// accumulated arguments parse as a JSON object; once an index is completed
/// no further deltas for it are accepted.
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::BridgeError;
use crate::host::{PartSink, ResponsePart};
use crate::protocol::StreamToolCall;
use crate::util::{generated_call_id, try_parse_json_object};

use super::dedup::EmittedCallGuard;

const FALLBACK_TOOL_NAME: &str = "unknown_tool";

/// How to treat buffers whose arguments never became valid JSON.
///
/// A `finish_reason` of `stop`/`tool_calls` is an explicit upstream contract
/// that arguments are complete, so invalid JSON there is a protocol
/// violation worth raising. A bare `[DONE]` or connection close offers no
/// such guarantee, so those buffers are dropped silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushMode {
    Strict,
    Soft,
}

#[derive(Debug, Default)]
struct ToolCallBuffer {
    id: Option<String>,
    name: Option<String>,
    arg_text: String,
}

/// Accumulator state for one stream session.
#[derive(Debug, Default)]
pub(crate) struct ToolCallAccumulator {
    buffers: FxHashMap<u32, ToolCallBuffer>,
    completed: FxHashSet<u32>,
}

impl ToolCallAccumulator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Merge one delta fragment and attempt eager emission.
    ///
    /// Returns true when a tool call was emitted as a result.
    pub(crate) fn absorb(
        &mut self,
        fragment: &StreamToolCall,
        guard: &mut EmittedCallGuard,
        sink: &mut dyn PartSink,
    ) -> bool {
        let index = fragment.index.unwrap_or(0);
        if self.completed.contains(&index) {
            return false;
        }

        let buffer = self.buffers.entry(index).or_default();
        if let Some(id) = fragment.id.as_deref() {
            buffer.id = Some(id.to_string());
        }
        if let Some(function) = fragment.function.as_ref() {
            if let Some(name) = function.name.as_deref() {
                buffer.name = Some(name.to_string());
            }
            if let Some(arguments) = function.arguments.as_deref() {
                buffer.arg_text.push_str(arguments);
            }
        }

        self.try_emit(index, guard, sink)
    }

    /// Emit the buffered call at `index` once name and arguments are ready.
    fn try_emit(
        &mut self,
        index: u32,
        guard: &mut EmittedCallGuard,
        sink: &mut dyn PartSink,
    ) -> bool {
        let Some(buffer) = self.buffers.get(&index) else {
            return false;
        };
        let Some(name) = buffer.name.clone() else {
            return false;
        };
        let Some(arguments) = try_parse_json_object(&buffer.arg_text) else {
            return false;
        };

        let buffer = self.buffers.remove(&index).unwrap_or_default();
        self.completed.insert(index);

        if !guard.claim_structured(&name, &arguments) {
            // Same logical call already surfaced through the inline path.
            return false;
        }
        let id = buffer
            .id
            .unwrap_or_else(|| generated_call_id("call"));
        sink.report(ResponsePart::ToolCall {
            id,
            name,
            arguments,
        });
        true
    }

    /// Flush all remaining buffered indices.
    ///
    /// # Errors
    ///
    /// In [`FlushMode::Strict`], a buffer whose arguments are not a valid
    /// JSON object aborts the response with
    /// [`BridgeError::ToolArguments`]. Soft flushes drop such buffers.
    pub(crate) fn flush(
        &mut self,
        mode: FlushMode,
        guard: &mut EmittedCallGuard,
        sink: &mut dyn PartSink,
    ) -> Result<bool, BridgeError> {
        if self.buffers.is_empty() {
            return Ok(false);
        }

        let mut indices: Vec<u32> = self.buffers.keys().copied().collect();
        indices.sort_unstable();

        let mut emitted = false;
        for index in indices {
            let Some(buffer) = self.buffers.remove(&index) else {
                continue;
            };
            let Some(arguments) = try_parse_json_object(&buffer.arg_text) else {
                if mode == FlushMode::Strict {
                    let snippet = buffer.arg_text.get(..200).unwrap_or(&buffer.arg_text);
                    tracing::error!(index, snippet, "invalid JSON for buffered tool call");
                    return Err(BridgeError::ToolArguments(format!(
                        "tool call at index {index} has invalid JSON arguments"
                    )));
                }
                self.completed.insert(index);
                continue;
            };

            self.completed.insert(index);
            let name = buffer.name.unwrap_or_else(|| FALLBACK_TOOL_NAME.to_string());
            if !guard.claim_structured(&name, &arguments) {
                continue;
            }
            let id = buffer.id.unwrap_or_else(|| generated_call_id("call"));
            sink.report(ResponsePart::ToolCall {
                id,
                name,
                arguments,
            });
            emitted = true;
        }
        Ok(emitted)
    }

    pub(crate) fn clear(&mut self) {
        self.buffers.clear();
        self.completed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StreamToolCallFunction;

    fn fragment(
        index: Option<u32>,
        id: Option<&str>,
        name: Option<&str>,
        arguments: Option<&str>,
    ) -> StreamToolCall {
        StreamToolCall {
            index,
            id: id.map(str::to_string),
            type_: None,
            function: Some(StreamToolCallFunction {
                name: name.map(str::to_string),
                arguments: arguments.map(str::to_string),
            }),
        }
    }

    fn tool_calls(parts: &[ResponsePart]) -> Vec<(String, String)> {
        parts
            .iter()
            .filter_map(|part| match part {
                ResponsePart::ToolCall {
                    name, arguments, ..
                } => Some((
                    name.clone(),
                    serde_json::to_string(&serde_json::Value::Object(arguments.clone())).unwrap(),
                )),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_arguments_concatenate_across_fragments() {
        let mut acc = ToolCallAccumulator::new();
        let mut guard = EmittedCallGuard::new();
        let mut parts: Vec<ResponsePart> = Vec::new();

        assert!(!acc.absorb(
            &fragment(Some(0), Some("call_1"), Some("get_weather"), Some("{\"loc")),
            &mut guard,
            &mut parts,
        ));
        assert!(acc.absorb(
            &fragment(Some(0), None, None, Some("ation\":\"SF\"}")),
            &mut guard,
            &mut parts,
        ));

        let calls = tool_calls(&parts);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "get_weather");
        assert_eq!(calls[0].1, r#"{"location":"SF"}"#);
    }

    #[test]
    fn test_missing_index_defaults_to_zero() {
        let mut acc = ToolCallAccumulator::new();
        let mut guard = EmittedCallGuard::new();
        let mut parts: Vec<ResponsePart> = Vec::new();

        acc.absorb(
            &fragment(None, Some("c"), Some("t"), Some("{")),
            &mut guard,
            &mut parts,
        );
        assert!(acc.absorb(
            &fragment(Some(0), None, None, Some("}")),
            &mut guard,
            &mut parts,
        ));
        assert_eq!(tool_calls(&parts).len(), 1);
    }

    #[test]
    fn test_completed_index_rejects_further_deltas() {
        let mut acc = ToolCallAccumulator::new();
        let mut guard = EmittedCallGuard::new();
        let mut parts: Vec<ResponsePart> = Vec::new();

        acc.absorb(
            &fragment(Some(2), Some("c2"), Some("t"), Some("{}")),
            &mut guard,
            &mut parts,
        );
        assert_eq!(tool_calls(&parts).len(), 1);

        // Late delta for the same index must be ignored entirely.
        assert!(!acc.absorb(
            &fragment(Some(2), None, None, Some("{\"late\":1}")),
            &mut guard,
            &mut parts,
        ));
        assert_eq!(tool_calls(&parts).len(), 1);
    }

    #[test]
    fn test_no_emission_without_name() {
        let mut acc = ToolCallAccumulator::new();
        let mut guard = EmittedCallGuard::new();
        let mut parts: Vec<ResponsePart> = Vec::new();

        acc.absorb(&fragment(Some(0), None, None, Some("{}")), &mut guard, &mut parts);
        assert!(parts.is_empty());

        // Flush supplies the fallback name.
        let emitted = acc.flush(FlushMode::Soft, &mut guard, &mut parts).unwrap();
        assert!(emitted);
        assert_eq!(tool_calls(&parts)[0].0, "unknown_tool");
    }

    #[test]
    fn test_strict_flush_raises_on_invalid_json() {
        let mut acc = ToolCallAccumulator::new();
        let mut guard = EmittedCallGuard::new();
        let mut parts: Vec<ResponsePart> = Vec::new();

        acc.absorb(
            &fragment(Some(0), Some("c"), Some("t"), Some("{\"a\":")),
            &mut guard,
            &mut parts,
        );
        let err = acc
            .flush(FlushMode::Strict, &mut guard, &mut parts)
            .unwrap_err();
        assert!(matches!(err, BridgeError::ToolArguments(_)));
        assert!(parts.is_empty());
    }

    #[test]
    fn test_soft_flush_drops_invalid_json_silently() {
        let mut acc = ToolCallAccumulator::new();
        let mut guard = EmittedCallGuard::new();
        let mut parts: Vec<ResponsePart> = Vec::new();

        acc.absorb(
            &fragment(Some(0), Some("c"), Some("t"), Some("{\"a\":")),
            &mut guard,
            &mut parts,
        );
        let emitted = acc.flush(FlushMode::Soft, &mut guard, &mut parts).unwrap();
        assert!(!emitted);
        assert!(parts.is_empty());

        // Flushing again is a no-op.
        assert!(!acc.flush(FlushMode::Soft, &mut guard, &mut parts).unwrap());
    }

    #[test]
    fn test_flush_emits_remaining_valid_buffers_in_index_order() {
        let mut acc = ToolCallAccumulator::new();
        let mut guard = EmittedCallGuard::new();
        let mut parts: Vec<ResponsePart> = Vec::new();

        // No names stream in, so nothing emits eagerly.
        acc.absorb(&fragment(Some(1), Some("c1"), None, Some("{\"b\":2}")), &mut guard, &mut parts);
        acc.absorb(&fragment(Some(0), Some("c0"), None, Some("{\"a\":1}")), &mut guard, &mut parts);
        assert!(parts.is_empty());

        acc.flush(FlushMode::Strict, &mut guard, &mut parts).unwrap();
        let calls = tool_calls(&parts);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, r#"{"a":1}"#);
        assert_eq!(calls[1].1, r#"{"b":2}"#);
    }

    #[test]
    fn test_structured_call_suppressed_after_inline_twin() {
        let mut acc = ToolCallAccumulator::new();
        let mut guard = EmittedCallGuard::new();
        let mut parts: Vec<ResponsePart> = Vec::new();

        let args = crate::util::try_parse_json_object(r#"{"q":"x"}"#).unwrap();
        assert!(guard.claim_inline("search", None, &args));

        let emitted = acc.absorb(
            &fragment(Some(0), Some("c"), Some("search"), Some(r#"{"q":"x"}"#)),
            &mut guard,
            &mut parts,
        );
        assert!(!emitted);
        assert!(parts.is_empty());
        // The index still counts as completed.
        assert!(!acc.absorb(
            &fragment(Some(0), None, None, Some("{}")),
            &mut guard,
            &mut parts,
        ));
    }
}
