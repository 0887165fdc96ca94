//! Classification of coordinator and branch responses
//!
//! Every response is first checked for the protocol's own result field. Only
//! when that is absent does the status code decide, and a status that maps
//! to no result is a transport failure, not a protocol answer.

use dtx_common::Outcome;
use dtx_common::constants::{JSON_RPC_CODE_FAILURE, JSON_RPC_CODE_ONGOING};
use serde::{Deserialize, Serialize};

/// HTTP status the protocol uses for FAILURE
pub const HTTP_STATUS_FAILURE: u16 = 409;
/// HTTP status the protocol uses for ONGOING (425 Too Early)
pub const HTTP_STATUS_ONGOING: u16 = 425;

/// Common response body of the coordinator and of branches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtmResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtm_result: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DtmResponse {
    pub fn success() -> Self {
        Self::with_result(Outcome::Success)
    }

    pub fn with_result(outcome: Outcome) -> Self {
        Self {
            dtm_result: Some(outcome.to_string()),
            ..Default::default()
        }
    }

    /// Parse a body; bodies that are not JSON objects yield `None`
    pub fn from_slice(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// The protocol result field, if present and recognised
    pub fn outcome(&self) -> Option<Outcome> {
        self.dtm_result.as_deref().and_then(|r| r.parse().ok())
    }
}

/// Classify a request/response reply.
///
/// Returns `None` when the reply carries no protocol result, or a result
/// field with an unknown value: the caller must treat it as a transport
/// failure.
pub fn classify_http(status: u16, body: &[u8]) -> Option<Outcome> {
    if let Some(result) = DtmResponse::from_slice(body).and_then(|r| r.dtm_result) {
        // An unrecognised result is never read as the status code's answer
        return result.parse().ok();
    }

    match status {
        HTTP_STATUS_FAILURE => Some(Outcome::Failure),
        HTTP_STATUS_ONGOING => Some(Outcome::Ongoing),
        200..=299 => Some(Outcome::Success),
        _ => None,
    }
}

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
    pub id: String,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
            id: id.into(),
        }
    }
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    #[serde(default)]
    pub id: Option<String>,
}

/// Classify a JSON-RPC reply.
///
/// The reserved error codes map to FAILURE and ONGOING; any other error is
/// returned as `Err` with its message so the caller can report a transport
/// failure.
pub fn classify_json_rpc(response: &JsonRpcResponse) -> Result<Outcome, String> {
    if let Some(error) = &response.error {
        return match error.code {
            JSON_RPC_CODE_FAILURE => Ok(Outcome::Failure),
            JSON_RPC_CODE_ONGOING => Ok(Outcome::Ongoing),
            code => Err(format!("json-rpc error {}: {}", code, error.message)),
        };
    }

    let result = response
        .result
        .as_ref()
        .and_then(|result| serde_json::from_value::<DtmResponse>(result.clone()).ok())
        .and_then(|r| r.dtm_result);
    match result {
        Some(result) => result
            .parse()
            .map_err(|_| format!("json-rpc result carries unknown dtm_result '{}'", result)),
        None => Ok(Outcome::Success),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_body_result_wins_over_status() {
        assert_eq!(
            classify_http(200, br#"{"dtm_result":"FAILURE"}"#),
            Some(Outcome::Failure)
        );
        assert_eq!(
            classify_http(500, br#"{"dtm_result":"ONGOING"}"#),
            Some(Outcome::Ongoing)
        );
    }

    #[test]
    fn test_status_fallbacks() {
        assert_eq!(classify_http(200, b""), Some(Outcome::Success));
        assert_eq!(classify_http(204, b"not json"), Some(Outcome::Success));
        assert_eq!(classify_http(409, b""), Some(Outcome::Failure));
        assert_eq!(classify_http(425, b"too early"), Some(Outcome::Ongoing));
    }

    #[test]
    fn test_non_protocol_errors_are_unclassified() {
        assert_eq!(classify_http(500, b"internal error"), None);
        assert_eq!(classify_http(404, b""), None);
        assert_eq!(classify_http(502, br#"{"message":"bad gateway"}"#), None);
    }

    #[test]
    fn test_unknown_result_is_unclassified() {
        assert_eq!(classify_http(200, br#"{"dtm_result":"bogus"}"#), None);
        assert_eq!(classify_http(200, br#"{"dtm_result":"failure"}"#), None);
        assert_eq!(classify_http(409, br#"{"dtm_result":""}"#), None);
    }

    #[test]
    fn test_json_rpc_unknown_result_is_an_error() {
        let lowercase: JsonRpcResponse =
            serde_json::from_value(json!({"result": {"dtm_result": "ongoing"}})).unwrap();
        assert!(classify_json_rpc(&lowercase).is_err());

        let bogus: JsonRpcResponse =
            serde_json::from_value(json!({"result": {"dtm_result": "bogus"}})).unwrap();
        assert!(classify_json_rpc(&bogus).is_err());
    }

    #[test]
    fn test_json_rpc_codes() {
        let failure = JsonRpcResponse {
            result: None,
            error: Some(JsonRpcError {
                code: JSON_RPC_CODE_FAILURE,
                message: "insufficient balance".to_string(),
            }),
            id: Some("1".to_string()),
        };
        assert_eq!(classify_json_rpc(&failure), Ok(Outcome::Failure));

        let ongoing: JsonRpcResponse =
            serde_json::from_value(json!({"error": {"code": -32902, "message": ""}})).unwrap();
        assert_eq!(classify_json_rpc(&ongoing), Ok(Outcome::Ongoing));

        let other: JsonRpcResponse =
            serde_json::from_value(json!({"error": {"code": -32601, "message": "no method"}}))
                .unwrap();
        assert!(classify_json_rpc(&other).is_err());
    }

    #[test]
    fn test_json_rpc_result_field() {
        let ok: JsonRpcResponse =
            serde_json::from_value(json!({"result": {"dtm_result": "SUCCESS", "gid": "g9"}}))
                .unwrap();
        assert_eq!(classify_json_rpc(&ok), Ok(Outcome::Success));

        let bare: JsonRpcResponse = serde_json::from_value(json!({"result": null})).unwrap();
        assert_eq!(classify_json_rpc(&bare), Ok(Outcome::Success));
    }
}
