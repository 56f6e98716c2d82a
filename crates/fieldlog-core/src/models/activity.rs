//! Activity tracking models and reconciliation acks

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::normalize;
use crate::util::normalize_text_option;

/// Caller-generated idempotency key correlating local and remote state.
///
/// The same logical event submitted twice under one id must never produce
/// two server-side activities; locally, a re-submission overwrites the
/// existing record instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientEventId(String);

impl ClientEventId {
    /// Generate a new time-sortable event id using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Borrow the string form of this id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientEventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClientEventId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "client event id must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// GPS fix retaining only the numeric members the device reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl GpsFix {
    /// True when no member carried a numeric value.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.latitude.is_none() && self.longitude.is_none() && self.accuracy.is_none()
    }
}

/// Canonical photo metadata attached to an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Capture timestamp (RFC 3339), normalized on ingestion
    pub captured_at: String,
}

/// Server acknowledgement written back after a successful delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Server-assigned activity identifier
    #[serde(default)]
    pub activity_id: Option<String>,
    /// Server-side status for the submitted item
    #[serde(default)]
    pub status: Option<String>,
}

/// Loose caller input for an activity save.
///
/// Every field is optional; the normalization pipeline fills defaults and
/// coerces shapes. Only `strategy_id` and `activity_type` are required to
/// accept the write at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityDraft {
    #[serde(default)]
    pub client_event_id: Option<String>,
    #[serde(default)]
    pub strategy_id: Option<String>,
    #[serde(default)]
    pub version_number: Option<i64>,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub activity_timestamp: Option<Value>,
    #[serde(default)]
    pub captured_offline: Option<bool>,
    #[serde(default)]
    pub gps: Option<Value>,
    #[serde(default)]
    pub application: Option<Value>,
    #[serde(default)]
    pub cost_summary: Option<Value>,
    #[serde(default)]
    pub yield_summary: Option<Value>,
    #[serde(default)]
    pub photos: Option<Value>,
}

/// Canonical field-recorded event, e.g. a strategy-progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Idempotency key, also the record's primary key
    pub client_event_id: ClientEventId,
    /// Strategy this activity belongs to
    pub strategy_id: String,
    /// Strategy version the activity was recorded against
    pub version_number: i64,
    /// Kind of field activity (planting, spraying, harvest, ...)
    pub activity_type: String,
    /// Progress status
    pub status: String,
    /// When the activity happened (RFC 3339)
    pub activity_timestamp: String,
    /// Whether the event was captured without connectivity
    pub captured_offline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps: Option<GpsFix>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub application: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub cost_summary: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub yield_summary: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<PhotoMeta>,
    /// Whether the remote service has confirmed this event
    #[serde(default)]
    pub synced: bool,
    /// Server-assigned identifier, present after reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
}

impl ActivityRecord {
    /// Build a canonical record from loose caller input.
    ///
    /// `offline` seeds `captured_offline` when the draft doesn't carry it.
    pub fn from_draft(draft: ActivityDraft, offline: bool) -> Result<Self> {
        let strategy_id = normalize_text_option(draft.strategy_id)
            .ok_or_else(|| Error::InvalidInput("activity requires a strategy_id".to_string()))?;
        let activity_type = normalize_text_option(draft.activity_type)
            .ok_or_else(|| Error::InvalidInput("activity requires an activity_type".to_string()))?;
        let client_event_id = match normalize_text_option(draft.client_event_id) {
            Some(id) => id.parse()?,
            None => ClientEventId::new(),
        };

        Ok(Self {
            client_event_id,
            strategy_id,
            version_number: draft.version_number.unwrap_or(1),
            activity_type,
            status: normalize_text_option(draft.status).unwrap_or_else(|| "pending".to_string()),
            activity_timestamp: normalize::normalize_timestamp(draft.activity_timestamp.as_ref()),
            captured_offline: draft.captured_offline.unwrap_or(offline),
            gps: normalize::normalize_gps(draft.gps.as_ref()),
            application: normalize::normalize_nested(draft.application.as_ref()),
            cost_summary: normalize::normalize_nested(draft.cost_summary.as_ref()),
            yield_summary: normalize::normalize_nested(draft.yield_summary.as_ref()),
            photos: normalize::normalize_photo_list(draft.photos.as_ref()),
            synced: false,
            activity_id: None,
        })
    }

    /// Apply a server acknowledgement (reconciliation write-back).
    pub fn apply_receipt(&mut self, receipt: &DeliveryReceipt) {
        if let Some(activity_id) = &receipt.activity_id {
            self.activity_id = Some(activity_id.clone());
        }
        if let Some(status) = &receipt.status {
            self.status.clone_from(status);
        }
        self.synced = true;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn minimal_draft() -> ActivityDraft {
        ActivityDraft {
            strategy_id: Some("strategy-7".to_string()),
            activity_type: Some("spraying".to_string()),
            ..ActivityDraft::default()
        }
    }

    #[test]
    fn client_event_id_unique() {
        assert_ne!(ClientEventId::new(), ClientEventId::new());
    }

    #[test]
    fn client_event_id_rejects_blank() {
        assert!("  ".parse::<ClientEventId>().is_err());
        assert!("evt-1".parse::<ClientEventId>().is_ok());
    }

    #[test]
    fn from_draft_requires_strategy_and_type() {
        let missing_strategy = ActivityDraft {
            activity_type: Some("planting".to_string()),
            ..ActivityDraft::default()
        };
        assert!(ActivityRecord::from_draft(missing_strategy, false).is_err());

        let missing_type = ActivityDraft {
            strategy_id: Some("strategy-7".to_string()),
            ..ActivityDraft::default()
        };
        assert!(ActivityRecord::from_draft(missing_type, false).is_err());
    }

    #[test]
    fn from_draft_fills_defaults() {
        let record = ActivityRecord::from_draft(minimal_draft(), true).unwrap();
        assert_eq!(record.version_number, 1);
        assert_eq!(record.status, "pending");
        assert!(record.captured_offline);
        assert!(!record.synced);
        assert!(record.activity_id.is_none());
        assert!(record.gps.is_none());
        assert!(record.application.is_empty());
        assert!(record.photos.is_empty());
        assert!(chrono::DateTime::parse_from_rfc3339(&record.activity_timestamp).is_ok());
    }

    #[test]
    fn from_draft_keeps_explicit_offline_flag() {
        let mut draft = minimal_draft();
        draft.captured_offline = Some(false);
        let record = ActivityRecord::from_draft(draft, true).unwrap();
        assert!(!record.captured_offline);
    }

    #[test]
    fn from_draft_preserves_caller_event_id() {
        let mut draft = minimal_draft();
        draft.client_event_id = Some(" evt-42 ".to_string());
        let record = ActivityRecord::from_draft(draft, false).unwrap();
        assert_eq!(record.client_event_id.as_str(), "evt-42");
    }

    #[test]
    fn from_draft_drops_non_numeric_gps() {
        let mut draft = minimal_draft();
        draft.gps = Some(json!({ "latitude": "bad" }));
        let record = ActivityRecord::from_draft(draft, false).unwrap();
        assert!(record.gps.is_none());
    }

    #[test]
    fn apply_receipt_marks_synced_and_copies_ids() {
        let mut record = ActivityRecord::from_draft(minimal_draft(), false).unwrap();
        record.apply_receipt(&DeliveryReceipt {
            activity_id: Some("act-900".to_string()),
            status: Some("confirmed".to_string()),
        });
        assert!(record.synced);
        assert_eq!(record.activity_id.as_deref(), Some("act-900"));
        assert_eq!(record.status, "confirmed");
    }

    #[test]
    fn empty_receipt_still_marks_synced() {
        let mut record = ActivityRecord::from_draft(minimal_draft(), false).unwrap();
        let status = record.status.clone();
        record.apply_receipt(&DeliveryReceipt::default());
        assert!(record.synced);
        assert!(record.activity_id.is_none());
        assert_eq!(record.status, status);
    }
}
