//! JSON-Schema normalization for Gemini function declarations.
//!
//! Gemini's function-declaration validator accepts only a small subset of
//! draft-07. This module reduces arbitrary tool parameter schemas to that
//! subset: `$ref`s are inlined, `allOf` members merged, union `type` arrays
//! and `oneOf`/`anyOf`/`const` collapsed, enums stringified, and unsupported
//! keywords dropped. The reduction is idempotent: a second pass over its own
//! output is a no-op.

use serde_json::{Map, Value, json};

/// Keywords Gemini's validator rejects; removed at every nesting level.
const DROPPED_KEYWORDS: &[&str] = &[
    "exclusiveMinimum",
    "exclusiveMaximum",
    "propertyNames",
    "minProperties",
    "maxProperties",
    "default",
    "$schema",
    "$id",
    "additionalProperties",
    "title",
    "examples",
    "definitions",
];

/// Recursion cap; cyclic `$ref` chains bottom out as `{}`.
const MAX_DEPTH: usize = 32;

/// Reduce an arbitrary JSON-Schema fragment to the Gemini-accepted subset.
#[must_use]
pub fn normalize_schema(schema: &Value) -> Value {
    let definitions = schema.get("definitions").cloned();
    normalize_value(schema, definitions.as_ref(), 0)
}

fn normalize_value(node: &Value, defs: Option<&Value>, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return json!({});
    }
    match node {
        Value::Object(map) => normalize_object(map, defs, depth),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| normalize_value(item, defs, depth + 1))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve `#/definitions/X` against the root definitions; unknown refs
/// become `{}`.
fn resolve_ref(reference: &str, defs: Option<&Value>) -> Value {
    reference
        .strip_prefix("#/definitions/")
        .and_then(|name| defs.and_then(|d| d.get(name)))
        .cloned()
        .unwrap_or_else(|| json!({}))
}

fn normalize_object(map: &Map<String, Value>, defs: Option<&Value>, depth: usize) -> Value {
    if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
        let resolved = resolve_ref(reference, defs);
        return normalize_value(&resolved, defs, depth + 1);
    }

    let mut merged = map.clone();

    // allOf: resolve each member and merge last-writer-wins.
    if let Some(Value::Array(members)) = merged.remove("allOf") {
        for member in members {
            let resolved = match member.get("$ref").and_then(Value::as_str) {
                Some(reference) => resolve_ref(reference, defs),
                None => member,
            };
            if let Value::Object(fields) = resolved {
                for (key, value) in fields {
                    merged.insert(key, value);
                }
            }
        }
    }

    // oneOf / anyOf: collapse the node to a single variant.
    let variants = merged.remove("oneOf").or_else(|| merged.remove("anyOf"));
    if let Some(Value::Array(members)) = variants {
        return collapse_variants(&members, defs, depth);
    }

    // const: single-element enum of the string form.
    if let Some(constant) = merged.remove("const") {
        return json!({
            "type": primitive_type(&constant),
            "enum": [stringify(&constant)],
        });
    }

    let mut out = Map::with_capacity(merged.len());
    for (key, value) in &merged {
        if DROPPED_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        match key.as_str() {
            "type" if value.is_array() => {
                let (ty, nullable) = collapse_union_type(value);
                out.insert("type".into(), Value::String(ty));
                if nullable {
                    out.insert("nullable".into(), Value::Bool(true));
                }
            }
            // handled below so enum values are stringified, not recursed
            "enum" => {}
            _ => {
                out.insert(key.clone(), normalize_value(value, defs, depth + 1));
            }
        }
    }

    if let Some(Value::Array(values)) = merged.get("enum") {
        let had_non_string = values.iter().any(|v| !v.is_string());
        out.insert(
            "enum".into(),
            Value::Array(values.iter().map(|v| Value::String(stringify(v))).collect()),
        );
        if had_non_string || !out.contains_key("type") {
            out.insert("type".into(), Value::String("string".into()));
        }
    }

    Value::Object(out)
}

/// Rule for `oneOf` / `anyOf`: an all-const variant list becomes a string
/// enum; otherwise the first typed member wins, defaulting to `string`.
fn collapse_variants(members: &[Value], defs: Option<&Value>, depth: usize) -> Value {
    let resolved: Vec<Value> = members
        .iter()
        .map(|member| match member.get("$ref").and_then(Value::as_str) {
            Some(reference) => resolve_ref(reference, defs),
            None => member.clone(),
        })
        .collect();

    if !resolved.is_empty() && resolved.iter().all(|m| m.get("const").is_some()) {
        let values: Vec<Value> = resolved
            .iter()
            .map(|m| Value::String(stringify(&m["const"])))
            .collect();
        return json!({"type": "string", "enum": values});
    }

    resolved
        .iter()
        .find(|m| m.get("type").is_some())
        .map_or_else(
            || json!({"type": "string"}),
            |m| normalize_value(m, defs, depth + 1),
        )
}

/// Rule for union `type` arrays: `["T", "null"]` becomes `(T, nullable)`;
/// several non-null types keep the first; empty falls back to `string`.
fn collapse_union_type(value: &Value) -> (String, bool) {
    let entries: Vec<&str> = value
        .as_array()
        .map(|arr| arr.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let non_null: Vec<&str> = entries.iter().filter(|t| **t != "null").copied().collect();
    let has_null = entries.len() != non_null.len();

    match non_null.as_slice() {
        [] => ("string".into(), false),
        [only] if has_null => ((*only).into(), true),
        [first, ..] => ((*first).into(), false),
    }
}

/// `String(v)` — the string form of any JSON scalar.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn primitive_type(value: &Value) -> &'static str {
    match value {
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        _ => "string",
    }
}
