use std::sync::atomic::{AtomicU64, Ordering};

static CALL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
const HEX: &[u8; 16] = b"0123456789abcdef";

/// Generate a unique id for a tool call the upstream did not name.
///
/// Combines a process-wide counter with a random component so ids stay
/// unique across sessions without any shared session state.
pub(crate) fn generated_call_id(prefix: &str) -> String {
    let seq = CALL_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = seq ^ fastrand::u64(..);
    let mut out = String::with_capacity(prefix.len() + 17);
    out.push_str(prefix);
    out.push('_');
    push_u64_hex_16(&mut out, mixed);
    out
}

#[inline]
fn push_u64_hex_16(out: &mut String, mut value: u64) {
    let mut buf = [b'0'; 16];
    let mut idx = 16;
    while idx > 0 {
        idx -= 1;
        buf[idx] = HEX[(value & 0x0f) as usize];
        value >>= 4;
    }
    for byte in buf {
        out.push(char::from(byte));
    }
}

/// Parse `text` as JSON and return the map only when it is an object.
///
/// Bare arrays, scalars, and malformed payloads all yield `None`; tool-call
/// arguments must be objects.
pub(crate) fn try_parse_json_object(
    text: &str,
) -> Option<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(text.trim()) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Dedup key for a tool call: name plus canonical JSON of its arguments.
///
/// `serde_json::Map` iterates in sorted key order, so serializing the parsed
/// object gives a canonical representation independent of how the upstream
/// ordered the keys.
pub(crate) fn canonical_call_key(
    name: &str,
    arguments: &serde_json::Map<String, serde_json::Value>,
) -> String {
    let canonical = serde_json::to_string(arguments).unwrap_or_default();
    let mut key = String::with_capacity(name.len() + 1 + canonical.len());
    key.push_str(name);
    key.push(':');
    key.push_str(&canonical);
    key
}
