//! Wire shapes for provider callback endpoints.

use serde::{Deserialize, Serialize};

/// Query string of a signed callback URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Acknowledgement body Daraja expects from a result URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_ack_matches_daraja_shape() {
        let body = serde_json::to_string(&CallbackAck::accepted()).unwrap();
        assert_eq!(body, r#"{"ResultCode":0,"ResultDesc":"Accepted"}"#);
    }
}
