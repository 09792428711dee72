//! Payloads produced by the remote parsing service.
//!
//! These are the shapes a CalDAV/iCal parser announces while walking a remote
//! calendar response. They are immutable once received; the pull pipeline only
//! reads them and derives local records from them.

use serde::{Deserialize, Deserializer, Serialize};

use crate::time::TransportTime;

/// A remote event, possibly carrying its recurrence exceptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    /// Remote UID. Missing ids deserialize to "" and are rejected by the store.
    #[serde(default)]
    pub id: String,
    /// UID of the master event, set on exceptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: TransportTime,
    pub end: TransportTime,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(
        default,
        deserialize_with = "falsy_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub recurrence_id: Option<TransportTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exceptions: Option<Vec<RemoteEvent>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alarms: Vec<RemoteAlarm>,
}

/// An alarm attached to an event or occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAlarm {
    pub action: String,
    /// Seconds relative to the occurrence start (negative fires before).
    pub trigger: i64,
}

/// One expanded instance of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOccurrence {
    /// Remote UID of the event this instance belongs to.
    pub event_id: String,
    pub recurrence_id: TransportTime,
    pub start: TransportTime,
    pub end: TransportTime,
    #[serde(default)]
    pub is_exception: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarms: Option<Vec<RemoteAlarm>>,
}

/// Raw iCal data for an event, plus how far its recurrence was expanded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteComponent {
    /// Remote UID of the event.
    pub event_id: String,
    pub ical: String,
    #[serde(default)]
    pub is_recurring: bool,
    /// Last expanded occurrence. Absent when expansion of the series is complete.
    #[serde(
        default,
        deserialize_with = "falsy_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_recurrence_id: Option<TransportTime>,
}

/// Treat JSON falsy values (`false`, `null`, `0`, `""`) as an absent time.
fn falsy_as_none<'de, D>(deserializer: D) -> Result<Option<TransportTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let falsy = match &value {
        serde_json::Value::Null => true,
        serde_json::Value::Bool(b) => !b,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    };

    if falsy {
        return Ok(None);
    }

    serde_json::from_value(value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}
