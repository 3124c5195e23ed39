//! Core domain types for the Chronoprises tracker.
//!
//! - Medications: user-defined recurring items
//! - Shots: timestamped intake records, snapshotting a medication's display fields
//! - View mode: the durable display preference

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ============================================================================
// Medication
// ============================================================================

/// A user-defined recurring medication
///
/// `uuid` is `None` on a write that means "create new". Records held by the
/// store always carry one.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Medication {
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_uuid",
        skip_serializing_if = "Option::is_none"
    )]
    pub uuid: Option<Uuid>,
    /// Display name
    pub primary: String,
    /// Free-text note
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    /// CSS color token used as avatar background
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Minimum spacing between doses, in hours
    #[serde(
        default,
        deserialize_with = "deserialize_hours",
        skip_serializing_if = "Option::is_none"
    )]
    pub delay: Option<f64>,
}

impl Medication {
    /// A medication with only a display name
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            uuid: None,
            primary: primary.into(),
            secondary: None,
            color: None,
            delay: None,
        }
    }

    pub fn with_secondary(mut self, secondary: impl Into<String>) -> Self {
        self.secondary = Some(secondary.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_delay(mut self, hours: f64) -> Self {
        self.delay = Some(hours);
        self
    }

    /// Form-boundary checks. The store itself never calls this.
    pub fn validate(&self) -> Result<()> {
        if self.primary.trim().is_empty() {
            return Err(Error::Validation("medication name is required".into()));
        }
        if let Some(delay) = self.delay {
            if !delay.is_finite() || delay < 0.0 {
                return Err(Error::Validation(format!(
                    "delay must be a non-negative number of hours, got {}",
                    delay
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Shot
// ============================================================================

/// A recorded intake
///
/// The display fields are copied from the medication at intake time, so
/// later edits or deletes of the medication never touch history.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Shot {
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_uuid",
        skip_serializing_if = "Option::is_none"
    )]
    pub uuid: Option<Uuid>,
    /// Intake time, epoch milliseconds
    pub ts: i64,
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Shot {
    /// Snapshot a medication's display fields at `taken_at`
    pub fn snapshot(medication: &Medication, taken_at: DateTime<Utc>) -> Self {
        Self {
            uuid: None,
            ts: taken_at.timestamp_millis(),
            primary: medication.primary.clone(),
            secondary: medication.secondary.clone(),
            color: medication.color.clone(),
        }
    }

    /// Intake time as a UTC instant (None if `ts` is out of chrono's range)
    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ts)
    }
}

// ============================================================================
// Display preference
// ============================================================================

/// How medications are rendered: a list or a grid of buttons
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    List,
    Button,
}

impl std::str::FromStr for ViewMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "list" => Ok(ViewMode::List),
            "button" | "buttons" => Ok(ViewMode::Button),
            other => Err(Error::Validation(format!("unknown view mode: {}", other))),
        }
    }
}

// ============================================================================
// Lenient field decoding
// ============================================================================

/// Accept anything for `uuid`: a malformed identifier reads as absent.
///
/// Import discards identifiers anyway; persisted records are keyed by the
/// map key, not by this field.
fn deserialize_lenient_uuid<'de, D>(deserializer: D) -> std::result::Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok()))
}

/// Hours may arrive as a number or, from older web-form exports, a string.
/// An empty string means no delay.
fn deserialize_hours<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Hours {
        Number(f64),
        Text(String),
    }

    match Option::<Hours>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Hours::Number(n)) => Ok(Some(n)),
        Some(Hours::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                trimmed
                    .parse::<f64>()
                    .map(Some)
                    .map_err(serde::de::Error::custom)
            }
        }
    }
}
