// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON extraction for LLM intent responses.
//!
//! Upstream completions arrive as raw JSON, fenced JSON, or JSON wrapped in
//! prose before and/or after. The pipeline is always:
//! fence strip -> balanced-brace extraction -> strict parse ->
//! repair-by-trim -> default. No `eval`, no lenient deserializers.

use std::collections::BTreeMap;

use tabletalk_core::types::IntentResponse;
use tracing::debug;

/// Parse an upstream completion into the four-key intent contract.
///
/// Never fails: anything unextractable yields [`IntentResponse::default`],
/// and missing keys default individually.
pub fn parse_intent_response(raw: &str) -> IntentResponse {
    let stripped = strip_code_fences(raw);

    let Some(candidate) = extract_json_object(&stripped) else {
        debug!("no JSON object found in completion");
        return IntentResponse::default();
    };

    if let Some(parsed) = parse_candidate(candidate) {
        return parsed;
    }

    // Repair pass: trim trailing text after the last balanced close brace.
    if let Some(repaired) = repair_by_trim(candidate) {
        if let Some(parsed) = parse_candidate(repaired) {
            return parsed;
        }
    }

    debug!("completion JSON unparseable after repair");
    IntentResponse::default()
}

/// Remove markdown code fences, keeping surrounding prose for the brace
/// scanner to skip over.
pub fn strip_code_fences(text: &str) -> String {
    if !text.contains("```") {
        return text.to_string();
    }
    text.lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Locate the first balanced `{ ... }` object via string-aware brace
/// counting. Returns the object slice, or `None` when no balanced object
/// exists.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Trim everything after the last `}` in the candidate.
fn repair_by_trim(candidate: &str) -> Option<&str> {
    let last = candidate.rfind('}')?;
    let repaired = &candidate[..=last];
    (repaired != candidate).then_some(repaired)
}

/// Strict parse plus per-key coercion into the contract shape.
fn parse_candidate(candidate: &str) -> Option<IntentResponse> {
    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    let obj = value.as_object()?;

    let mut fields = BTreeMap::new();
    if let Some(raw_fields) = obj.get("fields").and_then(|f| f.as_object()) {
        for (name, value) in raw_fields {
            if let Some(text) = value_to_string(value) {
                fields.insert(name.clone(), text);
            }
        }
    }

    Some(IntentResponse {
        id: obj.get("id").and_then(value_to_string).unwrap_or_default(),
        is_completed: obj
            .get("isCompleted")
            .map(value_to_bool)
            .unwrap_or(false),
        fields,
        next_prompt: obj
            .get("nextPrompt")
            .and_then(value_to_string)
            .unwrap_or_default(),
    })
}

/// Field values may arrive as strings, numbers, or booleans; all flatten to
/// strings. Nulls are dropped.
fn value_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn value_to_bool(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
