//! Maps failed exchanges onto the error taxonomy.
//!
//! Vendors report errors in many shapes. The message shown to the caller is
//! the vendor's own diagnostic whenever one can be found, so rejections such
//! as token limits stay debuggable.

use reqwest::StatusCode;
use serde_json::Value;

use crate::error::Error;
use crate::providers::ProviderId;

/// Finds the vendor diagnostic in a JSON error document.
fn vendor_message(document: &Value) -> Option<String> {
    if let Some(error) = document.get("error") {
        match error {
            Value::String(message) => return Some(message.clone()),
            Value::Object(object) => {
                if let Some(Value::String(message)) = object.get("message") {
                    return Some(message.clone());
                }
            }
            _ => {}
        }
    }

    if let Some(Value::String(message)) = document.get("message") {
        return Some(message.clone());
    }

    match document.get("detail") {
        Some(Value::String(detail)) => Some(detail.clone()),
        // [{loc, msg, type}, ...]
        Some(Value::Array(details)) => {
            let messages: Vec<&str> = details
                .iter()
                .filter_map(|detail| detail.get("msg").and_then(Value::as_str))
                .collect();

            if messages.is_empty() {
                None
            } else {
                Some(messages.join("; "))
            }
        }
        _ => None,
    }
}

fn is_text(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|content_type| {
        content_type
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("text/plain")
    })
}

/// Classifies a response with a non-success status.
///
/// 408 and 504 are timeouts, every other 4xx is a rejection of the inputs and
/// anything else is a server failure.
pub fn from_status(
    provider: ProviderId,
    status: u16,
    content_type: Option<&str>,
    body: &[u8],
) -> Error {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|document| vendor_message(&document))
        .or_else(|| {
            let text = String::from_utf8_lossy(body);
            let text = text.trim();

            (is_text(content_type) && !text.is_empty()).then(|| text.to_string())
        })
        .unwrap_or_else(|| {
            let reason = StatusCode::from_u16(status)
                .ok()
                .and_then(|status| status.canonical_reason())
                .unwrap_or("unknown status");

            format!("HTTP {} {}", status, reason)
        });

    match status {
        408 | 504 => Error::Timeout(format!("{}: {}", provider, message)),
        400..=499 => Error::UpstreamValidationError {
            provider,
            status: Some(status),
            message,
        },
        _ => Error::UpstreamServerError {
            provider,
            status: Some(status),
            message,
        },
    }
}

/// Classifies an error a vendor embedded in a streamed frame, e.g.
/// `{"error": "Input validation error: ...", "error_type": "validation"}`.
///
/// Returns `None` when the frame is not an error.
pub fn embedded(provider: ProviderId, frame: &Value) -> Option<Error> {
    let error = frame.get("error").filter(|error| !error.is_null())?;

    let message = vendor_message(frame).unwrap_or_else(|| error.to_string());

    let error_type = frame
        .get("error_type")
        .or_else(|| error.get("type"))
        .and_then(Value::as_str);

    Some(match error_type {
        Some("validation") => Error::UpstreamValidationError {
            provider,
            status: None,
            message,
        },
        _ => Error::UpstreamServerError {
            provider,
            status: None,
            message,
        },
    })
}
