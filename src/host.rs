use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smallvec::SmallVec;

/// A single typed part of a streamed assistant response, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    /// Visible assistant text.
    Text(String),
    /// Model-internal reasoning text, kept separate from visible text.
    Thinking {
        text: String,
        id: Option<String>,
        metadata: Option<serde_json::Value>,
    },
    /// A fully resolved tool invocation. `arguments` is always a JSON
    /// object, never a bare array or scalar.
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Map<String, serde_json::Value>,
    },
}

/// Ordered, synchronous receiver for streamed response parts.
///
/// The decoder invokes `report` as parts become available; parts are never
/// reordered or retracted once reported.
pub trait PartSink {
    fn report(&mut self, part: ResponsePart);
}

impl PartSink for Vec<ResponsePart> {
    fn report(&mut self, part: ResponsePart) {
        self.push(part);
    }
}

/// Adapter turning a closure into a [`PartSink`].
pub struct FnSink<F>(pub F);

impl<F> PartSink for FnSink<F>
where
    F: FnMut(ResponsePart),
{
    fn report(&mut self, part: ResponsePart) {
        (self.0)(part);
    }
}

/// What the host UI can render.
///
/// When `thinking_parts` is false, reasoning content degrades to ordinary
/// [`ResponsePart::Text`] parts instead of being dropped.
#[derive(Debug, Clone, Copy)]
pub struct HostCapabilities {
    pub thinking_parts: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            thinking_parts: true,
        }
    }
}

/// Cooperative cancellation flag, observed at the top of the per-chunk read
/// loop. Cancelling stops further reads; already-emitted parts stand and the
/// final buffer drain still runs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Host-side request model
// ---------------------------------------------------------------------------

/// Host message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostRole {
    System,
    User,
    Assistant,
}

/// A single part of a host chat message.
#[derive(Debug, Clone)]
pub enum HostPart {
    Text(String),
    /// A tool call previously issued by the assistant.
    ToolCall {
        call_id: String,
        name: String,
        input: serde_json::Value,
    },
    /// The host-side result for an earlier tool call.
    ToolResult {
        call_id: String,
        content: String,
    },
}

/// A chat message as provided by the host.
#[derive(Debug, Clone)]
pub struct HostMessage {
    pub role: HostRole,
    pub name: Option<String>,
    pub parts: SmallVec<[HostPart; 1]>,
}

impl HostMessage {
    #[must_use]
    pub fn text(role: HostRole, text: impl Into<String>) -> Self {
        Self {
            role,
            name: None,
            parts: smallvec::smallvec![HostPart::Text(text.into())],
        }
    }
}

/// A tool the host offers to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Option<serde_json::Value>,
}
