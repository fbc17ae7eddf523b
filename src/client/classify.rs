//! Inbound response classification.
//!
//! Every response lands in exactly one bucket, checked in this order:
//! authorization failure, structured validation failure, generic error,
//! success.

use serde_json::Value;

use crate::error::FieldError;

pub const VALIDATION_STATUS: u16 = 400;
pub const VALIDATION_CODE: &str = "VALIDATION_ERROR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Unauthorized,
    Validation(Vec<FieldError>),
    Application(String),
    Success,
}

pub fn classify(status: u16, body: &Value) -> Classification {
    if status == 401 {
        return Classification::Unauthorized;
    }
    if (200..300).contains(&status) {
        return Classification::Success;
    }
    if status == VALIDATION_STATUS {
        if let Some(fields) = validation_details(body) {
            return Classification::Validation(fields);
        }
    }
    Classification::Application(extract_message(status, body))
}

/// `{"error": {"code": "VALIDATION_ERROR", "details": [{"field", "message"}]}}`
fn validation_details(body: &Value) -> Option<Vec<FieldError>> {
    let error = body.get("error")?;
    if error.get("code").and_then(Value::as_str) != Some(VALIDATION_CODE) {
        return None;
    }
    let details = error.get("details")?.as_array()?;
    let fields: Vec<FieldError> = details
        .iter()
        .map(|detail| match detail {
            Value::String(message) => FieldError {
                field: String::new(),
                message: message.clone(),
            },
            other => serde_json::from_value(other.clone()).unwrap_or_else(|_| FieldError {
                field: String::new(),
                message: other.to_string(),
            }),
        })
        .collect();
    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

/// Human-readable message from the known envelope shapes, falling back to
/// a transport-style message built from the status.
pub fn extract_message(status: u16, body: &Value) -> String {
    let candidates = [
        body.pointer("/error/message"),
        body.get("message"),
        body.get("error"),
        body.get("detail"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string)
        .or_else(|| match body {
            Value::String(s) if !s.trim().is_empty() && s.len() <= 200 => {
                Some(s.trim().to_string())
            }
            _ => None,
        })
        .unwrap_or_else(|| format!("Request failed with status code {}", status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unauthorized_wins_over_envelope() {
        let body = json!({"error": {"code": "VALIDATION_ERROR", "details": [{"field": "a", "message": "b"}]}});
        assert_eq!(classify(401, &body), Classification::Unauthorized);
    }

    #[test]
    fn validation_requires_status_code_and_details() {
        let body = json!({"error": {"code": "VALIDATION_ERROR", "message": "bad input", "details": [
            {"field": "email", "message": "is required"},
            "password too short"
        ]}});
        match classify(400, &body) {
            Classification::Validation(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].field, "email");
                assert_eq!(fields[1].message, "password too short");
            }
            other => panic!("expected validation, got {:?}", other),
        }

        // same envelope under another status is a generic error
        assert_eq!(
            classify(422, &body),
            Classification::Application("bad input".to_string())
        );

        // empty details fall through as well
        let empty = json!({"error": {"code": "VALIDATION_ERROR", "message": "bad", "details": []}});
        assert_eq!(
            classify(400, &empty),
            Classification::Application("bad".to_string())
        );
    }

    #[test]
    fn message_extraction_order() {
        assert_eq!(
            extract_message(500, &json!({"error": {"message": "nested"}, "message": "top"})),
            "nested"
        );
        assert_eq!(extract_message(500, &json!({"message": "top"})), "top");
        assert_eq!(extract_message(403, &json!({"error": "forbidden"})), "forbidden");
        assert_eq!(
            extract_message(502, &Value::Null),
            "Request failed with status code 502"
        );
        assert_eq!(
            extract_message(503, &json!({"message": "  "})),
            "Request failed with status code 503"
        );
    }

    #[test]
    fn success_passes_through() {
        assert_eq!(classify(204, &Value::Null), Classification::Success);
        assert_eq!(classify(200, &json!({"error": "ignored"})), Classification::Success);
    }
}
