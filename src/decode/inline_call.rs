/// Inline tool-call token parser.
///
/// Some backends stream tool calls as control tokens embedded in the visible
/// text channel instead of structured deltas:
///
/// ```text
/// <|tool_call_begin|>name:index<|tool_call_argument_begin|>{...}<|tool_call_end|>
/// ```
///
/// The parser scans plain text for that grammar across arbitrary chunk
/// boundaries, extracts visible text separately from control payloads, and
/// reports completed calls through the shared dedup guard. At most one call
/// is in flight at a time; nested or parallel inline calls are not part of
/// the grammar.
use std::sync::LazyLock;

use memchr::memmem;
use regex_lite::Regex;

use crate::host::{PartSink, ResponsePart};
use crate::util::{generated_call_id, try_parse_json_object};

use super::dedup::EmittedCallGuard;

const BEGIN: &str = "<|tool_call_begin|>";
const ARG_BEGIN: &str = "<|tool_call_argument_begin|>";
const END: &str = "<|tool_call_end|>";

const FALLBACK_TOOL_NAME: &str = "unknown_tool";

/// `name[:index]` between BEGIN and the first delimiter.
static HEADER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_\-.]+)(?::([0-9]+))?").expect("header pattern"));

/// Control markers some backends leak into the text channel; stripped from
/// visible output wherever they appear.
static SECTION_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\|[a-zA-Z0-9_-]+_section_(?:begin|end)\|>").expect("section marker pattern")
});
static CALL_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\|tool_call_(?:argument_)?(?:begin|end)\|>").expect("call marker pattern")
});

/// What one `process` call emitted, for flow control upstream.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ProcessOutcome {
    pub(crate) emitted_text: bool,
    pub(crate) emitted_any: bool,
}

#[derive(Debug)]
struct ActiveCall {
    name: Option<String>,
    index: Option<u32>,
    arg_buffer: String,
    emitted: bool,
}

/// Incremental parser state for one stream session.
#[derive(Debug, Default)]
pub(crate) struct InlineCallParser {
    pending: String,
    active: Option<ActiveCall>,
}

impl InlineCallParser {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Scan one plain-text chunk, reporting visible text and completed tool
    /// calls. Partial markers at the chunk tail are withheld and re-examined
    /// when the next chunk arrives.
    pub(crate) fn process(
        &mut self,
        input: &str,
        guard: &mut EmittedCallGuard,
        sink: &mut dyn PartSink,
    ) -> ProcessOutcome {
        let mut data = std::mem::take(&mut self.pending);
        data.push_str(input);
        let mut visible = String::new();
        let mut outcome = ProcessOutcome::default();

        while !data.is_empty() {
            if self.active.is_some() {
                // Inside arguments: collect until END, emitting as soon as
                // the accumulated text parses as a JSON object.
                let Some(end) = memmem::find(data.as_bytes(), END.as_bytes()) else {
                    // Withhold a tail that could still become END.
                    let held = longest_suffix_prefix(&data, END);
                    let tail = data.split_off(data.len() - held);
                    if let Some(active) = self.active.as_mut() {
                        active.arg_buffer.push_str(&data);
                        if !active.emitted
                            && emit_if_valid(active, &active.arg_buffer, guard, sink)
                        {
                            active.emitted = true;
                            outcome.emitted_any = true;
                        }
                    }
                    self.pending = tail;
                    break;
                };

                if let Some(active) = self.active.as_mut() {
                    active.arg_buffer.push_str(&data[..end]);
                    if !active.emitted && emit_if_valid(active, &active.arg_buffer, guard, sink) {
                        outcome.emitted_any = true;
                    }
                }
                data.drain(..end + END.len());
                self.active = None;
                continue;
            }

            let Some(begin) = memmem::find(data.as_bytes(), BEGIN.as_bytes()) else {
                // No call starts here. Emit all visible text except a tail
                // that could still become BEGIN.
                let held = longest_suffix_prefix(&data, BEGIN);
                let visible_len = data.len() - held;
                if visible_len > 0 {
                    strip_control_tokens_into(&data[..visible_len], &mut visible);
                }
                self.pending = data.split_off(visible_len);
                break;
            };

            if begin > 0 {
                strip_control_tokens_into(&data[..begin], &mut visible);
            }
            data.drain(..begin + BEGIN.len());

            let arg_at = memmem::find(data.as_bytes(), ARG_BEGIN.as_bytes());
            let end_at = memmem::find(data.as_bytes(), END.as_bytes());
            let (delim_at, delim_is_args) = match (arg_at, end_at) {
                (Some(a), Some(e)) if a < e => (a, true),
                (Some(a), None) => (a, true),
                (_, Some(e)) => (e, false),
                (None, None) => {
                    // Incomplete header; re-prepend BEGIN so nothing is lost
                    // and wait for more data.
                    let mut held = String::with_capacity(BEGIN.len() + data.len());
                    held.push_str(BEGIN);
                    held.push_str(&data);
                    self.pending = held;
                    break;
                }
            };

            let (name, index) = parse_header(data[..delim_at].trim());
            if delim_is_args {
                data.drain(..delim_at + ARG_BEGIN.len());
                self.active = Some(ActiveCall {
                    name,
                    index,
                    arg_buffer: String::new(),
                    emitted: false,
                });
            } else {
                // No-argument call: finalize immediately with empty-object
                // arguments.
                data.drain(..delim_at + END.len());
                let call = ActiveCall {
                    name,
                    index,
                    arg_buffer: String::new(),
                    emitted: false,
                };
                if emit_if_valid(&call, "{}", guard, sink) {
                    outcome.emitted_any = true;
                }
            }
        }

        if !visible.is_empty() {
            sink.report(ResponsePart::Text(visible));
            outcome.emitted_text = true;
            outcome.emitted_any = true;
        }

        outcome
    }

    /// Force-attempt emission of the in-flight call at end-of-stream.
    ///
    /// A call whose arguments never became a valid JSON object is dropped
    /// silently. Held-back partial markers are discarded; they must never
    /// reach visible output.
    pub(crate) fn flush_active(
        &mut self,
        guard: &mut EmittedCallGuard,
        sink: &mut dyn PartSink,
    ) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        emit_if_valid(&active, &active.arg_buffer, guard, sink)
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.active = None;
    }
}

fn parse_header(header: &str) -> (Option<String>, Option<u32>) {
    let Some(captures) = HEADER_PATTERN.captures(header) else {
        return (None, None);
    };
    let name = captures.get(1).map(|m| m.as_str().to_string());
    let index = captures.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
    (name, index)
}

fn emit_if_valid(
    call: &ActiveCall,
    arg_text: &str,
    guard: &mut EmittedCallGuard,
    sink: &mut dyn PartSink,
) -> bool {
    let Some(arguments) = try_parse_json_object(arg_text) else {
        return false;
    };
    let name = call.name.as_deref().unwrap_or(FALLBACK_TOOL_NAME);
    if !guard.claim_inline(name, call.index, &arguments) {
        return false;
    }
    sink.report(ResponsePart::ToolCall {
        id: generated_call_id("tct"),
        name: name.to_string(),
        arguments,
    });
    true
}

fn strip_control_tokens_into(text: &str, out: &mut String) {
    if !text.contains("<|") {
        out.push_str(text);
        return;
    }
    let stripped = SECTION_MARKERS.replace_all(text, "");
    let stripped = CALL_MARKERS.replace_all(&stripped, "");
    out.push_str(&stripped);
}

/// Length of the longest suffix of `text` that is a strict prefix of
/// `marker` (all markers are ASCII).
fn longest_suffix_prefix(text: &str, marker: &str) -> usize {
    let max = marker.len().saturating_sub(1).min(text.len());
    for k in (1..=max).rev() {
        if text.as_bytes().ends_with(&marker.as_bytes()[..k]) {
            return k;
        }
    }
    0
}

#[cfg(test)]
#[path = "inline_call_tests.rs"]
mod tests;
