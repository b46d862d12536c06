use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// The uniform wrapper every backend response uses.
///
/// Successful calls carry their payload in `data`. Failed calls set a non-2xx
/// `statusCode` and put an [`ErrorDetail`] in `data`; the HTTP status may still be 200.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Application status code; 200 on success.
    pub status_code: u16,

    /// Short outcome message, e.g. "Success" or "Fail".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// The payload, or an error detail object on failure.
    #[serde(default)]
    pub data: Value,
}

/// Error body carried in the `data` field of a failed envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    /// Symbolic code such as `FILE_EMPTY`.
    #[serde(default)]
    pub status_code_name: Option<String>,

    /// Human-readable description.
    #[serde(default)]
    pub detail_message: Option<String>,
}

impl Envelope {
    /// Wrap a successful payload.
    pub fn success(data: Value) -> Self {
        Self {
            status_code: 200,
            message: Some("Success".to_string()),
            data,
        }
    }

    /// Build a failed envelope.
    pub fn fail(status_code: u16, name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status_code,
            message: Some("Fail".to_string()),
            data: serde_json::json!({
                "statusCodeName": name.into(),
                "detailMessage": detail.into(),
            }),
        }
    }

    /// Returns true when `statusCode` is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Returns the error detail if `data` carries one.
    pub fn error_detail(&self) -> Option<ErrorDetail> {
        serde_json::from_value::<ErrorDetail>(self.data.clone())
            .ok()
            .filter(|detail| detail.detail_message.is_some() || detail.status_code_name.is_some())
    }

    /// Convert a failed envelope into a request error.
    ///
    /// `fallback_status` is used when the envelope reports success but the HTTP
    /// layer did not.
    pub fn into_error(self, fallback_status: u16) -> Error {
        let status_code = if self.is_success() {
            fallback_status
        } else {
            self.status_code
        };
        match self.error_detail() {
            Some(detail) => Error::request(
                status_code,
                detail.status_code_name,
                detail
                    .detail_message
                    .or(self.message)
                    .unwrap_or_else(|| "request failed".to_string()),
            ),
            None => Error::request(
                status_code,
                None,
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ),
        }
    }

    /// Extract the typed payload, failing if the envelope reports an error.
    pub fn into_data<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        if !self.is_success() {
            let status_code = self.status_code;
            return Err(self.into_error(status_code));
        }
        serde_json::from_value(self.data).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response data: {e}"),
                Some(Box::new(e)),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_yields_data() {
        let envelope: Envelope = serde_json::from_value(json!({
            "statusCode": 200,
            "message": "Success",
            "data": [{"id": 1, "title": "a.pdf"}]
        }))
        .unwrap();
        let data: Value = envelope.into_data().unwrap();
        assert_eq!(data[0]["title"], "a.pdf");
    }

    #[test]
    fn null_data_deserializes_as_unit() {
        let envelope: Envelope =
            serde_json::from_value(json!({"statusCode": 200, "data": null})).unwrap();
        let () = envelope.into_data().unwrap();
    }

    #[test]
    fn failed_envelope_carries_name_and_detail() {
        let envelope: Envelope = serde_json::from_value(json!({
            "statusCode": 40000,
            "message": "Fail",
            "data": {
                "statusCodeName": "CHATROOM_NOT_FOUND",
                "detailMessage": "no such room"
            }
        }))
        .unwrap();
        assert!(!envelope.is_success());
        let err = envelope.into_data::<Value>().unwrap_err();
        assert_eq!(err.status_code(), Some(40000));
        assert_eq!(err.status_code_name(), Some("CHATROOM_NOT_FOUND"));
        assert_eq!(err.to_string(), "[CHATROOM_NOT_FOUND] no such room");
    }

    #[test]
    fn success_envelope_on_http_error_uses_fallback_status() {
        let err = Envelope::success(Value::Null).into_error(500);
        assert_eq!(err.status_code(), Some(500));
    }
}
