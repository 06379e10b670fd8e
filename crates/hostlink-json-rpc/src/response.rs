use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{JsonRpcVersion, RequestId};

/// A successful JSON-RPC response.
///
/// Error responses are a separate type ([`crate::JsonRpcError`]) so that a
/// value can never carry both `result` and `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    #[serde(default)]
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id: id.into(),
            result,
        }
    }

    pub fn null(id: impl Into<RequestId>) -> Self {
        Self::success(id, Value::Null)
    }
}

impl<T> From<(RequestId, T)> for JsonRpcResponse
where
    T: Into<Value>,
{
    fn from((id, result): (RequestId, T)) -> Self {
        Self::success(id, result.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_string};

    #[test]
    fn test_response_serialization() {
        let response = JsonRpcResponse::success(1, json!({"version": "1.0"}));

        let json_str = to_string(&response).unwrap();
        let parsed: JsonRpcResponse = from_str(&json_str).unwrap();

        assert_eq!(parsed.id, RequestId::Number(1));
        assert_eq!(parsed.result, json!({"version": "1.0"}));
        assert!(json_str.contains(r#""jsonrpc":"2.0""#));
    }

    #[test]
    fn test_null_response() {
        let response = JsonRpcResponse::null(RequestId::String("test".into()));
        let json_str = to_string(&response).unwrap();

        assert!(json_str.contains(r#""result":null"#));
        let parsed: JsonRpcResponse = from_str(&json_str).unwrap();
        assert!(parsed.result.is_null());
    }

    #[test]
    fn test_response_from_tuple() {
        let response: JsonRpcResponse = (RequestId::Number(1), json!({"test": true})).into();
        assert_eq!(response.id, RequestId::Number(1));
        assert_eq!(response.result["test"], true);
    }
}
