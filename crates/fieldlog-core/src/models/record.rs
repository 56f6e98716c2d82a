//! Record model and the collection registry

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Named collections the local store is organized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Crop variety catalog entries
    Varieties,
    /// Variety recommendations computed for a user
    Recommendations,
    /// Per-user preferences
    Preferences,
    /// GPS field mapping data
    FieldData,
    /// Photo metadata
    Photos,
    /// Activity tracking entries (strategy-progress updates)
    Activities,
}

impl Collection {
    /// All known collections, in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Varieties,
        Self::Recommendations,
        Self::Preferences,
        Self::FieldData,
        Self::Photos,
        Self::Activities,
    ];

    /// Stable snake_case name used in storage and endpoint paths.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Varieties => "varieties",
            Self::Recommendations => "recommendations",
            Self::Preferences => "preferences",
            Self::FieldData => "field_data",
            Self::Photos => "photos",
            Self::Activities => "activities",
        }
    }

    /// Declared primary-key field for payloads in this collection.
    pub const fn key_field(self) -> &'static str {
        match self {
            Self::Varieties => "variety_id",
            Self::Recommendations => "recommendation_id",
            Self::Preferences => "preference_id",
            Self::FieldData => "field_id",
            Self::Photos => "photo_id",
            Self::Activities => "client_event_id",
        }
    }

    /// Validate a payload at the store boundary.
    ///
    /// Payloads must be JSON objects. When a payload carries its
    /// collection's declared key field, the value must agree with the row
    /// key, so a record can never be overwritten by data keyed for a
    /// different row or collection.
    pub fn validate_payload(self, key: &str, payload: &Value) -> Result<()> {
        if !payload.is_object() {
            return Err(Error::InvalidInput(format!(
                "{self} payload must be a JSON object"
            )));
        }
        if let Some(declared) = payload.get(self.key_field()).and_then(Value::as_str) {
            if declared != key {
                return Err(Error::InvalidInput(format!(
                    "{self} payload declares {}={declared} but is keyed as {key}",
                    self.key_field()
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|collection| collection.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown collection: {s}")))
    }
}

/// A durable entity belonging to a named collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Owning collection
    pub collection: Collection,
    /// Primary key, unique within the collection
    pub key: String,
    /// JSON object payload
    pub payload: Value,
    /// Whether the record has been confirmed by the remote service
    pub synced: bool,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
}

impl StoredRecord {
    /// Owning user extracted from the payload, if present.
    pub fn owner(&self) -> Option<String> {
        owner_of(&self.payload)
    }
}

/// Extract the owning user from a payload (`owner` or `user_id` field).
pub fn owner_of(payload: &Value) -> Option<String> {
    payload
        .get("owner")
        .or_else(|| payload.get("user_id"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .map(str::to_string)
}
