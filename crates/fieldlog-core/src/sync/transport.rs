//! Remote delivery transport

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::models::{DeliveryReceipt, SyncPayload};
use crate::util::compact_text;

/// Seam between the coordinator and the wire.
///
/// One call is one synchronous request/response delivery attempt; the
/// coordinator owns retries and disposal.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Deliver a payload to its endpoint, returning the server's ack.
    async fn deliver(&self, payload: &SyncPayload) -> Result<DeliveryReceipt>;
}

/// HTTP implementation speaking JSON to the farm-management API.
///
/// Activities go to a bespoke endpoint that is idempotent on
/// `client_event_id`; generic records post to their collection path.
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport from a validated API configuration.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = config.normalized_base_url()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { base_url, client })
    }

    fn endpoint_for(&self, payload: &SyncPayload) -> String {
        match payload {
            SyncPayload::Record { collection, .. } => {
                format!("{}/v1/records/{collection}", self.base_url)
            }
            SyncPayload::Activity(_) => format!("{}/v1/activities", self.base_url),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct DeliveryResponse {
    #[serde(default)]
    activity_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl From<DeliveryResponse> for DeliveryReceipt {
    fn from(value: DeliveryResponse) -> Self {
        Self {
            activity_id: value.activity_id,
            status: value.status,
        }
    }
}

#[async_trait]
impl SyncTransport for HttpTransport {
    async fn deliver(&self, payload: &SyncPayload) -> Result<DeliveryReceipt> {
        let endpoint = self.endpoint_for(payload);
        let response = self
            .client
            .post(&endpoint)
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(Error::Delivery {
                status: status.as_u16(),
                message: compact_text(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(DeliveryReceipt::default());
        }
        // An unrecognized 2xx body is a success without an ack
        let parsed: DeliveryResponse = serde_json::from_str(&body).unwrap_or_default();
        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::models::{ActivityDraft, ActivityRecord, Collection};

    use super::*;

    fn transport() -> HttpTransport {
        HttpTransport::new(&ApiConfig::new("https://api.example.com/")).unwrap()
    }

    #[test]
    fn records_post_to_their_collection_path() {
        let payload = SyncPayload::Record {
            collection: Collection::FieldData,
            key: "f-1".to_string(),
            payload: json!({}),
        };
        assert_eq!(
            transport().endpoint_for(&payload),
            "https://api.example.com/v1/records/field_data"
        );
    }

    #[test]
    fn activities_post_to_the_idempotent_endpoint() {
        let activity = ActivityRecord::from_draft(
            ActivityDraft {
                strategy_id: Some("s-1".to_string()),
                activity_type: Some("planting".to_string()),
                ..ActivityDraft::default()
            },
            false,
        )
        .unwrap();
        assert_eq!(
            transport().endpoint_for(&SyncPayload::Activity(activity)),
            "https://api.example.com/v1/activities"
        );
    }

    #[test]
    fn response_fields_map_onto_the_receipt() {
        let response: DeliveryResponse =
            serde_json::from_value(json!({ "activity_id": "act-1", "status": "confirmed" }))
                .unwrap();
        let receipt = DeliveryReceipt::from(response);
        assert_eq!(receipt.activity_id.as_deref(), Some("act-1"));
        assert_eq!(receipt.status.as_deref(), Some("confirmed"));
    }
}
