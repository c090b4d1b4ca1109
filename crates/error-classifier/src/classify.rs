use serde_json::{Map, Value};

use crate::{Failure, Messages};

/// Classify a failure with the default message table.
pub fn classify(failure: &Failure) -> String {
    classify_with(failure, &Messages::default())
}

/// Classify a failure into exactly one non-empty, display-ready message.
pub fn classify_with(failure: &Failure, messages: &Messages) -> String {
    match failure {
        Failure::Response { status, body } => classify_response(*status, body, messages),
        Failure::NoResponse => text(messages, |m| &m.no_connection),
        Failure::Setup { message } if !message.is_empty() => message.clone(),
        Failure::Setup { .. } => text(messages, |m| &m.unknown),
    }
}

fn classify_response(status: u16, body: &Value, messages: &Messages) -> String {
    match status {
        401 => text(messages, |m| &m.unauthorized),
        403 => text(messages, |m| &m.forbidden),
        404 => text(messages, |m| &m.not_found),
        400 | 422 => match body {
            Value::Object(fields) => {
                let flattened = flatten_fields(fields);
                if flattened.is_empty() {
                    text(messages, |m| &m.invalid_data)
                } else {
                    flattened
                }
            }
            other => detail(other).unwrap_or_else(|| text(messages, |m| &m.bad_request)),
        },
        500.. => text(messages, |m| &m.server_error),
        _ => detail(body).unwrap_or_else(|| text(messages, |m| &m.generic)),
    }
}

/// A fixed message, falling back to the default text when a configured
/// entry is blank.
fn text(messages: &Messages, field: fn(&Messages) -> &String) -> String {
    match field(messages) {
        configured if !configured.trim().is_empty() => configured.clone(),
        _ => field(&Messages::default()).clone(),
    }
}

/// Join every field's messages, in insertion order, into one sentence list.
fn flatten_fields(fields: &Map<String, Value>) -> String {
    fields
        .values()
        .filter_map(field_text)
        .collect::<Vec<_>>()
        .join(". ")
}

fn field_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(", "),
        // Nested mappings, numbers and booleans are kept in their JSON form.
        other => other.to_string(),
    };

    (!text.is_empty()).then_some(text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// An explicit `detail` or `message` string on an object body.
fn detail(body: &Value) -> Option<String> {
    ["detail", "message"].iter().find_map(|field| {
        body.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_owned)
    })
}
