use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{JsonRpcVersion, RequestId};

/// A JSON-RPC request. Params are opaque to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: RequestId,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    /// Create a new request with no parameters
    pub fn new_no_params(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self::new(id, method, None)
    }

    /// Get a parameter by name (if params are an object)
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }

    /// Serialize into the structured form handed to message channels
    pub fn to_value(&self) -> Value {
        // A struct of strings, ids and JSON values always serializes.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_without_params_omits_field() {
        let request = JsonRpcRequest::new_no_params(1, "settings.get");

        assert_eq!(
            request.to_value(),
            json!({"jsonrpc": "2.0", "method": "settings.get", "id": 1})
        );
    }

    #[test]
    fn test_request_with_params() {
        let request = JsonRpcRequest::new(
            RequestId::String("req1".to_string()),
            "albums.rename",
            Some(json!({"album": 3, "name": "Summer"})),
        );

        assert_eq!(request.get_param("name"), Some(&json!("Summer")));
        assert_eq!(request.get_param("missing"), None);

        let parsed: JsonRpcRequest = serde_json::from_value(request.to_value()).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_request_with_array_params() {
        let request = JsonRpcRequest::new(2, "gallery.tag", Some(json!(["a", "b"])));
        assert_eq!(request.get_param("a"), None);
        assert_eq!(request.to_value()["params"][1], "b");
    }
}
