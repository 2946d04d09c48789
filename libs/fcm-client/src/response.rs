/// Response normalization
///
/// Turns a raw HTTP status/headers/body triple into a [`ResponseRecord`].
/// For legacy multicast sends the requested registration ids are walked in
/// lockstep with the response `results` array to report canonical id remaps
/// and ids the service no longer recognizes.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::errors::{FCMError, Result};

/// Error value the legacy API reports for uninstalled or expired ids
pub const NOT_REGISTERED: &str = "NotRegistered";

/// Human-readable outcome of a request, derived from the status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    BadRequest,
    AuthenticationError,
    ServerUnavailable,
    InternalServerError,
}

impl Outcome {
    pub fn from_status(status_code: u16) -> Option<Self> {
        match status_code {
            200 => Some(Outcome::Success),
            400 => Some(Outcome::BadRequest),
            401 => Some(Outcome::AuthenticationError),
            503 => Some(Outcome::ServerUnavailable),
            500..=599 => Some(Outcome::InternalServerError),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::BadRequest => "Invalid JSON or request fields.",
            Outcome::AuthenticationError => "Authentication error.",
            Outcome::ServerUnavailable => "Server temporarily unavailable.",
            Outcome::InternalServerError => "Internal FCM server error.",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Old registration id and the canonical id that replaces it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalId {
    pub old: String,
    pub new: String,
}

/// One per-recipient entry of a legacy multicast response
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LegacyResultItem {
    pub message_id: Option<String>,
    pub registration_id: Option<String>,
    pub error: Option<String>,
}

/// Legacy `/fcm/send` response body
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyResponse {
    pub success: u64,
    pub failure: u64,
    pub canonical_ids: u64,
    pub results: Vec<LegacyResultItem>,
}

/// Normalized result of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRecord {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// Body exactly as received
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_ids: Option<Vec<CanonicalId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_registered_ids: Option<Vec<String>>,
}

impl ResponseRecord {
    pub fn is_success(&self) -> bool {
        self.response == Some(Outcome::Success)
    }
}

/// Normalize a response.
///
/// `requested_ids` is `Some` only for legacy sends addressed by registration
/// ids; in that case both id lists are always present, possibly empty.
pub fn normalize(
    status_code: u16,
    headers: BTreeMap<String, String>,
    body: String,
    requested_ids: Option<&[String]>,
) -> Result<ResponseRecord> {
    let response = Outcome::from_status(status_code);

    let parsed_body = if body.trim().is_empty() {
        None
    } else if status_code == 200 {
        let value = serde_json::from_str::<Value>(&body)
            .map_err(|e| FCMError::ResponseParse(e.to_string()))?;
        Some(value)
    } else {
        serde_json::from_str::<Value>(&body).ok()
    };

    let (canonical_ids, not_registered_ids) = match requested_ids {
        Some(ids) => {
            let legacy = match (&parsed_body, status_code) {
                (Some(value), 200) => LegacyResponse::deserialize(value).unwrap_or_else(|e| {
                    warn!("Unexpected FCM multicast response shape: {}", e);
                    LegacyResponse::default()
                }),
                _ => LegacyResponse::default(),
            };
            if !legacy.results.is_empty() && legacy.results.len() != ids.len() {
                warn!(
                    "FCM returned {} results for {} registration ids",
                    legacy.results.len(),
                    ids.len()
                );
            }
            (
                Some(extract_canonical_ids(&legacy, ids)),
                Some(extract_not_registered_ids(&legacy, ids)),
            )
        }
        None => (None, None),
    };

    Ok(ResponseRecord {
        status_code,
        headers,
        body,
        parsed_body,
        response,
        canonical_ids,
        not_registered_ids,
    })
}

/// Pair each result with the id at the same index; stops at the shorter side
fn paired<'a>(
    legacy: &'a LegacyResponse,
    ids: &'a [String],
) -> impl Iterator<Item = (&'a String, &'a LegacyResultItem)> {
    ids.iter().zip(legacy.results.iter())
}

fn extract_canonical_ids(legacy: &LegacyResponse, ids: &[String]) -> Vec<CanonicalId> {
    if legacy.canonical_ids == 0 {
        return Vec::new();
    }

    paired(legacy, ids)
        .filter_map(|(old, result)| {
            result.registration_id.as_ref().map(|new| CanonicalId {
                old: old.clone(),
                new: new.clone(),
            })
        })
        .collect()
}

fn extract_not_registered_ids(legacy: &LegacyResponse, ids: &[String]) -> Vec<String> {
    if legacy.failure == 0 {
        return Vec::new();
    }

    paired(legacy, ids)
        .filter(|(_, result)| result.error.as_deref() == Some(NOT_REGISTERED))
        .map(|(id, _)| id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_success_without_requested_ids() {
        let record = normalize(200, BTreeMap::new(), "{}".to_string(), None).unwrap();

        assert_eq!(record.status_code, 200);
        assert_eq!(record.response, Some(Outcome::Success));
        assert_eq!(record.body, "{}");
        assert_eq!(record.parsed_body, Some(json!({})));
        assert!(record.canonical_ids.is_none());
        assert!(record.not_registered_ids.is_none());

        let serialized = serde_json::to_value(&record).unwrap();
        assert_eq!(serialized["response"], "success");
        assert!(serialized.get("canonical_ids").is_none());
        assert!(serialized.get("not_registered_ids").is_none());
    }

    #[test]
    fn test_requested_ids_yield_empty_lists() {
        let body = json!({ "canonical_ids": 0, "failure": 0, "results": [{}] }).to_string();
        let requested = ids(&["42"]);
        let record = normalize(200, BTreeMap::new(), body, Some(&requested)).unwrap();

        assert_eq!(record.canonical_ids, Some(vec![]));
        assert_eq!(record.not_registered_ids, Some(vec![]));
    }

    #[test]
    fn test_empty_body_with_requested_ids() {
        let requested = ids(&["42"]);
        let record = normalize(200, BTreeMap::new(), String::new(), Some(&requested)).unwrap();

        assert!(record.parsed_body.is_none());
        assert_eq!(record.canonical_ids, Some(vec![]));
        assert_eq!(record.not_registered_ids, Some(vec![]));
    }

    #[test]
    fn test_canonical_and_not_registered_extraction() {
        let body = json!({
            "multicast_id": 216,
            "success": 3,
            "failure": 2,
            "canonical_ids": 1,
            "results": [
                { "message_id": "1:0408" },
                { "error": "Unavailable" },
                { "error": "NotRegistered" },
                { "message_id": "1:1516" },
                { "message_id": "1:2342", "registration_id": "32" }
            ]
        })
        .to_string();
        let requested = ids(&["4", "8", "15", "16", "23"]);
        let record = normalize(200, BTreeMap::new(), body, Some(&requested)).unwrap();

        assert_eq!(
            record.canonical_ids,
            Some(vec![CanonicalId {
                old: "23".to_string(),
                new: "32".to_string()
            }])
        );
        assert_eq!(record.not_registered_ids, Some(ids(&["15"])));
    }

    #[test]
    fn test_counts_gate_extraction() {
        // registration_id present but canonical_ids count is zero
        let body = json!({
            "canonical_ids": 0,
            "failure": 0,
            "results": [{ "registration_id": "new", "error": "NotRegistered" }]
        })
        .to_string();
        let requested = ids(&["old"]);
        let record = normalize(200, BTreeMap::new(), body, Some(&requested)).unwrap();

        assert_eq!(record.canonical_ids, Some(vec![]));
        assert_eq!(record.not_registered_ids, Some(vec![]));
    }

    #[test]
    fn test_result_count_mismatch_walks_shorter_side() {
        let body = json!({
            "failure": 2,
            "results": [{ "error": "NotRegistered" }, { "error": "NotRegistered" }]
        })
        .to_string();
        let requested = ids(&["a"]);
        let record = normalize(200, BTreeMap::new(), body, Some(&requested)).unwrap();

        assert_eq!(record.not_registered_ids, Some(ids(&["a"])));
    }

    #[test]
    fn test_status_labels() {
        let cases = [
            (400, Some("Invalid JSON or request fields.")),
            (401, Some("Authentication error.")),
            (503, Some("Server temporarily unavailable.")),
            (500, Some("Internal FCM server error.")),
            (502, Some("Internal FCM server error.")),
            (404, None),
            (302, None),
        ];

        for (status, label) in cases {
            let record = normalize(status, BTreeMap::new(), "{}".to_string(), None).unwrap();
            assert_eq!(record.response.map(|o| o.label()), label, "status {}", status);
        }
    }

    #[test]
    fn test_unauthorized_never_derives_id_lists() {
        let body = json!({ "failure": 1, "results": [{ "error": "NotRegistered" }] }).to_string();
        let requested = ids(&["42"]);
        let record = normalize(401, BTreeMap::new(), body.clone(), Some(&requested)).unwrap();

        assert_eq!(record.response, Some(Outcome::AuthenticationError));
        assert_eq!(record.body, body);
        assert_eq!(record.not_registered_ids, Some(vec![]));
    }

    #[test]
    fn test_non_json_error_body_passes_through() {
        let record = normalize(
            502,
            BTreeMap::new(),
            "<html>Bad Gateway</html>".to_string(),
            None,
        )
        .unwrap();

        assert!(record.parsed_body.is_none());
        assert_eq!(record.body, "<html>Bad Gateway</html>");
    }

    #[test]
    fn test_large_multicast_id_is_ignored() {
        let body = r#"{"multicast_id":12345678901234567890,"success":0,"failure":1,"canonical_ids":0,"results":[{"error":"NotRegistered"}]}"#;
        let requested = ids(&["42"]);
        let record = normalize(200, BTreeMap::new(), body.to_string(), Some(&requested)).unwrap();

        assert_eq!(record.not_registered_ids, Some(ids(&["42"])));
    }

    #[test]
    fn test_unexpected_legacy_shape_yields_empty_lists() {
        let requested = ids(&["42"]);
        for body in [
            json!({ "failure": 1, "canonical_ids": 1, "results": null }),
            json!({ "failure": "one", "results": [{ "error": "NotRegistered" }] }),
            json!([1, 2, 3]),
        ] {
            let record =
                normalize(200, BTreeMap::new(), body.to_string(), Some(&requested)).unwrap();

            assert_eq!(record.response, Some(Outcome::Success));
            assert_eq!(record.parsed_body, Some(body));
            assert_eq!(record.canonical_ids, Some(vec![]));
            assert_eq!(record.not_registered_ids, Some(vec![]));
        }
    }

    #[test]
    fn test_non_json_success_body_is_an_error() {
        let result = normalize(200, BTreeMap::new(), "not json".to_string(), None);
        assert!(matches!(result, Err(FCMError::ResponseParse(_))));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        let body = json!({ "canonical_ids": 1, "results": [{ "registration_id": "n" }] }).to_string();
        let requested = ids(&["o"]);

        let first = normalize(200, headers.clone(), body.clone(), Some(&requested)).unwrap();
        let second = normalize(200, headers, body, Some(&requested)).unwrap();
        assert_eq!(first, second);
    }
}
