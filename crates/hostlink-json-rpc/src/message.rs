use serde_json::Value;
use thiserror::Error;

use crate::{
    JSONRPC_VERSION, error::JsonRpcError, notification::JsonRpcNotification,
    request::JsonRpcRequest, response::JsonRpcResponse,
};

/// Any structurally valid inbound JSON-RPC message
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    /// `id` + `result`
    Response(JsonRpcResponse),
    /// `id` (possibly null) + `error`
    Error(JsonRpcError),
    /// `method`, no `id`
    Notification(JsonRpcNotification),
    /// `method` + `id`: the peer is asking us something
    Request(JsonRpcRequest),
}

/// Why an inbound value was rejected before reaching correlation state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedMessage {
    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("missing or unsupported jsonrpc version")]
    BadVersion,

    #[error("response carries both result and error")]
    ResultAndError,

    #[error("response carries neither result nor error")]
    MissingOutcome,

    #[error("message has neither id nor method")]
    Unclassifiable,

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl JsonRpcMessage {
    /// Structurally classify an inbound value.
    ///
    /// A message must declare `"jsonrpc": "2.0"` and be either an `id` with
    /// exactly one of `result`/`error`, or a `method` without an `id`. A
    /// `method` together with a non-null `id` is a peer-initiated request.
    pub fn classify(value: Value) -> Result<Self, MalformedMessage> {
        let obj = value.as_object().ok_or(MalformedMessage::NotAnObject)?;

        match obj.get("jsonrpc") {
            Some(version) if version == JSONRPC_VERSION => {}
            _ => return Err(MalformedMessage::BadVersion),
        }

        let id_present = obj.contains_key("id");
        let has_id = obj.get("id").is_some_and(|id| !id.is_null());
        let has_method = obj.contains_key("method");
        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");

        if has_method {
            if has_result || has_error {
                return Err(MalformedMessage::InvalidField {
                    field: "method",
                    reason: "present on a response".to_string(),
                });
            }
            return if has_id {
                decode(value, "request").map(JsonRpcMessage::Request)
            } else if id_present {
                // Explicit null id on a call is neither request nor notification
                Err(MalformedMessage::InvalidField {
                    field: "id",
                    reason: "null id on a method call".to_string(),
                })
            } else {
                decode(value, "notification").map(JsonRpcMessage::Notification)
            };
        }

        match (has_result, has_error) {
            (true, true) => Err(MalformedMessage::ResultAndError),
            (false, false) if id_present => {
                Err(MalformedMessage::MissingOutcome)
            }
            (false, false) => Err(MalformedMessage::Unclassifiable),
            (true, false) if has_id => decode(value, "response").map(JsonRpcMessage::Response),
            (true, false) => Err(MalformedMessage::InvalidField {
                field: "id",
                reason: "missing on a result response".to_string(),
            }),
            (false, true) => decode(value, "error").map(JsonRpcMessage::Error),
        }
    }

    /// The method name for notifications and peer requests
    pub fn method(&self) -> Option<&str> {
        match self {
            JsonRpcMessage::Notification(n) => Some(&n.method),
            JsonRpcMessage::Request(r) => Some(&r.method),
            _ => None,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    value: Value,
    field: &'static str,
) -> Result<T, MalformedMessage> {
    serde_json::from_value(value).map_err(|e| MalformedMessage::InvalidField {
        field,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;
    use serde_json::json;

    #[test]
    fn test_classifies_success_response() {
        let message = JsonRpcMessage::classify(
            json!({"jsonrpc": "2.0", "id": 1, "result": {"version": "1.0"}}),
        )
        .unwrap();

        let JsonRpcMessage::Response(response) = message else {
            panic!("Expected response, got: {:?}", message);
        };
        assert_eq!(response.id, RequestId::Number(1));
        assert_eq!(response.result, json!({"version": "1.0"}));
    }

    #[test]
    fn test_classifies_null_result_as_response() {
        let message =
            JsonRpcMessage::classify(json!({"jsonrpc": "2.0", "id": "a", "result": null}))
                .unwrap();
        assert!(matches!(message, JsonRpcMessage::Response(ref r) if r.result.is_null()));
    }

    #[test]
    fn test_classifies_error_response_with_null_id() {
        let message = JsonRpcMessage::classify(json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": -32700, "message": "Parse error"}
        }))
        .unwrap();

        let JsonRpcMessage::Error(error) = message else {
            panic!("Expected error response");
        };
        assert!(error.id.is_none());
        assert_eq!(error.error.code, -32700);
    }

    #[test]
    fn test_classifies_notification_and_request() {
        let notification = JsonRpcMessage::classify(json!({
            "jsonrpc": "2.0",
            "method": "gallery.scanProgress",
            "params": {"percent": 50}
        }))
        .unwrap();
        assert_eq!(notification.method(), Some("gallery.scanProgress"));
        assert!(matches!(notification, JsonRpcMessage::Notification(_)));

        let request = JsonRpcMessage::classify(
            json!({"jsonrpc": "2.0", "method": "ui.confirm", "id": 9}),
        )
        .unwrap();
        assert!(matches!(request, JsonRpcMessage::Request(_)));
    }

    #[test]
    fn test_rejects_malformed_messages() {
        let cases = [
            (json!("text"), MalformedMessage::NotAnObject),
            (json!({"id": 1, "result": 1}), MalformedMessage::BadVersion),
            (
                json!({"jsonrpc": "1.0", "id": 1, "result": 1}),
                MalformedMessage::BadVersion,
            ),
            (
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": 1,
                    "error": {"code": 1, "message": "x"}
                }),
                MalformedMessage::ResultAndError,
            ),
            (json!({"jsonrpc": "2.0", "id": 1}), MalformedMessage::MissingOutcome),
            (json!({"jsonrpc": "2.0"}), MalformedMessage::Unclassifiable),
        ];

        for (value, expected) in cases {
            assert_eq!(JsonRpcMessage::classify(value.clone()), Err(expected), "{}", value);
        }
    }

    #[test]
    fn test_rejects_bad_field_types() {
        let bad_method = JsonRpcMessage::classify(json!({"jsonrpc": "2.0", "method": 5}));
        assert!(matches!(bad_method, Err(MalformedMessage::InvalidField { .. })));

        let bad_error = JsonRpcMessage::classify(
            json!({"jsonrpc": "2.0", "id": 1, "error": "boom"}),
        );
        assert!(matches!(bad_error, Err(MalformedMessage::InvalidField { .. })));
    }
}
