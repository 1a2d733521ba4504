//! Callable fingerprints and structural input keys

use serde_json::{Map, Value as JsonValue};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Field separator in composed in-flight keys
const KEY_SEPARATOR: char = '\u{1}';

/// Fast non-cryptographic hash of a callable's source text
///
/// Collisions are acceptable; affinity is a best-effort hint and coalescing
/// keys additionally include the structural argument keys.
pub fn fingerprint(source: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    hasher.finish()
}

/// Stable, order-sensitive, type-tagged linearization of a JSON value
///
/// Not a JSON encoding: every node carries a type tag and strings are
/// length-prefixed, so distinct values can never collide through
/// concatenation. Equal keys imply semantically equal inputs.
pub fn structural_key(value: &JsonValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Structural key over an argument vector
pub fn args_key(args: &[JsonValue]) -> String {
    let mut out = String::new();
    out.push('A');
    push_len(&mut out, args.len());
    for arg in args {
        write_value(&mut out, arg);
    }
    out
}

/// Structural key over an optional environment map
pub fn env_key(env: Option<&Map<String, JsonValue>>) -> String {
    match env {
        Some(map) => {
            let mut out = String::new();
            write_map(&mut out, map);
            out
        }
        None => "-".to_string(),
    }
}

/// Composed key identifying an in-flight request
pub fn in_flight_key(
    fingerprint: u64,
    args: &[JsonValue],
    env: Option<&Map<String, JsonValue>>,
) -> String {
    let mut key = format!("{:x}", fingerprint);
    key.push(KEY_SEPARATOR);
    key.push_str(&args_key(args));
    key.push(KEY_SEPARATOR);
    key.push_str(&env_key(env));
    key
}

fn write_value(out: &mut String, value: &JsonValue) {
    match value {
        JsonValue::Null => out.push('z'),
        JsonValue::Bool(b) => {
            out.push('b');
            out.push(if *b { '1' } else { '0' });
        }
        JsonValue::Number(n) => {
            out.push('n');
            push_str(out, &n.to_string());
        }
        JsonValue::String(s) => {
            out.push('s');
            push_str(out, s);
        }
        JsonValue::Array(items) => {
            out.push('a');
            push_len(out, items.len());
            for item in items {
                write_value(out, item);
            }
        }
        JsonValue::Object(map) => write_map(out, map),
    }
}

fn write_map(out: &mut String, map: &Map<String, JsonValue>) {
    out.push('o');
    push_len(out, map.len());
    for (key, value) in map {
        push_str(out, key);
        write_value(out, value);
    }
}

fn push_str(out: &mut String, s: &str) {
    push_len(out, s.len());
    out.push_str(s);
}

fn push_len(out: &mut String, len: usize) {
    out.push_str(&len.to_string());
    out.push(':');
}
