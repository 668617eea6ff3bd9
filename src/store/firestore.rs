//! Firestore REST account store
//!
//! Talks to the Firestore v1 document API:
//! - `GET  documents/accounts/{key}` reads one account (404 means absent)
//! - `PATCH documents/accounts/{key}` with an update mask merge-writes it
//! - `POST documents/feedback` appends a feedback document
//!
//! Field values use Firestore's typed encoding (`integerValue` is a
//! decimal string).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{parse_last_used, AccountStore, StoreError, ACCOUNTS_COLLECTION, FEEDBACK_COLLECTION};
use crate::billing::{AccountRecord, FeedbackEntry, PlanTier};
use crate::identity::AccountKey;

/// Connection settings for the Firestore REST API
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,

    /// OAuth bearer token, sent as `Authorization: Bearer ...`
    pub access_token: Option<String>,

    /// Web API key, sent as the `key` query parameter
    pub api_key: Option<String>,

    /// Base URL (default: https://firestore.googleapis.com)
    pub base_url: String,

    /// Database id (default: `(default)`)
    pub database: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            access_token: None,
            api_key: None,
            base_url: "https://firestore.googleapis.com".to_string(),
            database: "(default)".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Firestore document envelope
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Remote account store backed by Firestore
pub struct RemoteStore {
    client: Client,
    config: FirestoreConfig,
}

impl RemoteStore {
    pub fn new(config: FirestoreConfig) -> Result<Self, StoreError> {
        if config.project_id.trim().is_empty() {
            return Err(StoreError::Unconfigured(
                "FIRESTORE_PROJECT_ID is not set".to_string(),
            ));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, config })
    }

    fn documents_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents",
            self.config.base_url.trim_end_matches('/'),
            self.config.project_id,
            self.config.database
        )
    }

    fn account_url(&self, key: &AccountKey) -> String {
        format!("{}/{}/{}", self.documents_url(), ACCOUNTS_COLLECTION, key)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.config.access_token {
            builder = builder.bearer_auth(token);
        }
        if let Some(key) = &self.config.api_key {
            builder = builder.query(&[("key", key.as_str())]);
        }
        builder
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AccountStore for RemoteStore {
    fn backend_name(&self) -> &'static str {
        "firestore"
    }

    async fn get_account(&self, key: &AccountKey) -> Result<Option<AccountRecord>, StoreError> {
        let response = self
            .request(Method::GET, &self.account_url(key))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let document: Document = Self::check_status(response).await?.json().await?;
        decode_account(key, &document.fields).map(Some)
    }

    async fn put_account(&self, key: &AccountKey, record: &AccountRecord) -> Result<(), StoreError> {
        let fields = encode_account(record);
        let mask: Vec<(&str, &str)> = fields
            .keys()
            .map(|field| ("updateMask.fieldPaths", field.as_str()))
            .collect();

        let response = self
            .request(Method::PATCH, &self.account_url(key))
            .query(&mask)
            .json(&Document { name: None, fields: fields.clone() })
            .send()
            .await?;
        Self::check_status(response).await?;

        debug!(account = %key, usage = record.usage_count, tier = %record.plan_tier, "Merged account document");
        Ok(())
    }

    async fn append_feedback(&self, entry: &FeedbackEntry) -> Result<(), StoreError> {
        let url = format!("{}/{}", self.documents_url(), FEEDBACK_COLLECTION);
        let response = self
            .request(Method::POST, &url)
            .json(&Document {
                name: None,
                fields: encode_feedback(entry),
            })
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }
}

fn timestamp_value(ts: &DateTime<Utc>) -> Value {
    json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

fn encode_account(record: &AccountRecord) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        "usage_count".to_string(),
        json!({ "integerValue": record.usage_count.to_string() }),
    );
    fields.insert(
        "plan_tier".to_string(),
        json!({ "stringValue": record.plan_tier.as_str() }),
    );
    if let Some(ts) = &record.last_used_at {
        fields.insert("last_used_at".to_string(), timestamp_value(ts));
    }
    fields
}

fn encode_feedback(entry: &FeedbackEntry) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert(
        "account_key".to_string(),
        json!({ "stringValue": entry.account_key.as_str() }),
    );
    fields.insert(
        "rating".to_string(),
        json!({ "integerValue": entry.rating.to_string() }),
    );
    fields.insert("input".to_string(), json!({ "stringValue": entry.input }));
    fields.insert("response".to_string(), json!({ "stringValue": entry.response }));
    fields.insert("timestamp".to_string(), timestamp_value(&entry.timestamp));
    fields
}

fn decode_account(key: &AccountKey, fields: &Map<String, Value>) -> Result<AccountRecord, StoreError> {
    let usage_count = match fields.get("usage_count") {
        None => 0,
        Some(value) => decode_integer(value)
            .ok_or_else(|| StoreError::decode(format!("usage_count is not an integer: {}", value)))?,
    };

    let plan_tier = match fields.get("plan_tier").and_then(|v| v.get("stringValue")) {
        None => PlanTier::Free,
        Some(raw) => raw
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                warn!(account = %key, tier = %raw, "Unknown stored plan tier, treating as free");
                PlanTier::Free
            }),
    };

    let last_used_at = fields
        .get("last_used_at")
        .and_then(|v| v.get("timestampValue"))
        .and_then(Value::as_str)
        .and_then(|raw| parse_last_used(key, raw));

    Ok(AccountRecord {
        usage_count,
        plan_tier,
        last_used_at,
    })
}

/// Accepts `integerValue` (string or number) and whole `doubleValue`s
fn decode_integer(value: &Value) -> Option<u32> {
    if let Some(raw) = value.get("integerValue") {
        return match raw {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            _ => None,
        };
    }
    value
        .get("doubleValue")
        .and_then(Value::as_f64)
        .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u32::MAX as f64)
        .map(|f| f as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

    fn store_for(server: &MockServer) -> RemoteStore {
        RemoteStore::new(FirestoreConfig {
            project_id: "demo".to_string(),
            access_token: Some("token-123".to_string()),
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap()
    }

    fn key() -> AccountKey {
        AccountKey::from_email("user+promo@test.com").unwrap()
    }

    #[test]
    fn test_requires_project_id() {
        assert!(matches!(
            RemoteStore::new(FirestoreConfig::default()),
            Err(StoreError::Unconfigured(_))
        ));
    }

    #[tokio::test]
    async fn test_get_decodes_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/accounts/user@test.com", DOCS)))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "projects/demo/databases/(default)/documents/accounts/user@test.com",
                "fields": {
                    "usage_count": { "integerValue": "2" },
                    "plan_tier": { "stringValue": "essential" },
                    "last_used_at": { "timestampValue": "2024-05-01T12:00:00.000000Z" }
                }
            })))
            .mount(&server)
            .await;

        let record = store_for(&server).get_account(&key()).await.unwrap().unwrap();
        assert_eq!(record.usage_count, 2);
        assert_eq!(record.plan_tier, PlanTier::Essential);
        assert!(record.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_get_missing_tier_defaults_to_free() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fields": { "usage_count": { "integerValue": "1" } }
            })))
            .mount(&server)
            .await;

        let record = store_for(&server).get_account(&key()).await.unwrap().unwrap();
        assert_eq!(record.plan_tier, PlanTier::Free);
        assert_eq!(record.usage_count, 1);
    }

    #[tokio::test]
    async fn test_get_not_found_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
            .mount(&server)
            .await;

        assert!(store_for(&server).get_account(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_server_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = store_for(&server).get_account(&key()).await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_put_sends_mask_and_typed_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{}/accounts/user@test.com", DOCS)))
            .and(query_param("updateMask.fieldPaths", "usage_count"))
            .and(body_partial_json(json!({
                "fields": {
                    "usage_count": { "integerValue": "3" },
                    "plan_tier": { "stringValue": "free" }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let record = AccountRecord {
            usage_count: 3,
            plan_tier: PlanTier::Free,
            last_used_at: None,
        };
        store_for(&server).put_account(&key(), &record).await.unwrap();
    }

    #[tokio::test]
    async fn test_append_feedback_posts_to_collection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/feedback", DOCS)))
            .and(body_partial_json(json!({
                "fields": {
                    "account_key": { "stringValue": "user@test.com" },
                    "rating": { "integerValue": "5" }
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let entry = FeedbackEntry {
            account_key: key(),
            rating: 5,
            input: "bolo de pote".to_string(),
            response: "Doce que cabe na bolsa".to_string(),
            timestamp: Utc::now(),
        };
        store_for(&server).append_feedback(&entry).await.unwrap();
    }

    #[test]
    fn test_decode_integer_variants() {
        assert_eq!(decode_integer(&json!({ "integerValue": "7" })), Some(7));
        assert_eq!(decode_integer(&json!({ "integerValue": 7 })), Some(7));
        assert_eq!(decode_integer(&json!({ "doubleValue": 2.0 })), Some(2));
        assert_eq!(decode_integer(&json!({ "doubleValue": 2.5 })), None);
        assert_eq!(decode_integer(&json!({ "stringValue": "2" })), None);
    }

    #[test]
    fn test_decode_rejects_garbage_count() {
        let mut fields = Map::new();
        fields.insert("usage_count".to_string(), json!({ "stringValue": "lots" }));
        assert!(matches!(
            decode_account(&key(), &fields),
            Err(StoreError::Decode(_))
        ));
    }
}
