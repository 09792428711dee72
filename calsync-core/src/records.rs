//! Local record shapes persisted by the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::RemoteEvent;
use crate::time::TransportTime;

/// A remote event as stored locally, keyed by its derived id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEvent {
    #[serde(rename = "_id")]
    pub id: String,
    pub calendar_id: String,
    /// Id of the master event; only set on recurrence exceptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Remote payload with `exceptions` stripped.
    pub remote: RemoteEvent,
}

/// A time interval occupied by one event instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalBusytime {
    #[serde(rename = "_id")]
    pub id: String,
    pub event_id: String,
    pub calendar_id: String,
    pub start: TransportTime,
    pub end: TransportTime,
}

/// An alarm for one busytime. Never embedded in the busytime record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalAlarm {
    /// `<busytime id>-<position in the occurrence's alarm list>`.
    #[serde(rename = "_id")]
    pub id: String,
    pub busytime_id: String,
    pub event_id: String,
    pub start_date: TransportTime,
    pub action: String,
    pub trigger: i64,
}

/// Raw iCal data for one event, keyed by the event's derived id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcalComponentRecord {
    pub event_id: String,
    pub calendar_id: String,
    pub ical: String,
    #[serde(default)]
    pub is_recurring: bool,
    /// Only present while recurrence expansion is incomplete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_recurrence_id: Option<TransportTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// A calendar bound to an account, with its sync bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarRecord {
    pub id: String,
    pub account_id: String,
    pub name: String,
    /// Sync token last reported by the server for this calendar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_sync_token: Option<String>,
    /// Sync token whose events have been merged locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_sync_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_event_sync_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_event_sync_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CalendarRecord {
    pub fn new(id: impl Into<String>, account_id: impl Into<String>, name: impl Into<String>) -> Self {
        CalendarRecord {
            id: id.into(),
            account_id: account_id.into(),
            name: name.into(),
            remote_sync_token: None,
            last_event_sync_token: None,
            last_event_sync_date: None,
            first_event_sync_date: None,
            error: None,
        }
    }

    /// Record a successful event sync that started at `started`.
    pub fn mark_synced(&mut self, started: DateTime<Utc>) {
        self.error = None;
        self.last_event_sync_token = self.remote_sync_token.clone();
        self.last_event_sync_date = Some(started);
        if self.first_event_sync_date.is_none() {
            self.first_event_sync_date = Some(started);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_component_without_last_recurrence_id_omits_key() {
        let record = IcalComponentRecord {
            event_id: "cal-uid".into(),
            calendar_id: "cal".into(),
            ical: "x".into(),
            is_recurring: false,
            last_recurrence_id: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("lastRecurrenceId"));
        assert_eq!(object["eventId"], "cal-uid");
    }

    #[test]
    fn test_mark_synced_keeps_first_sync_date() {
        let first = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

        let mut calendar = CalendarRecord::new("cal", "acct", "Work");
        calendar.remote_sync_token = Some("token-1".into());
        calendar.error = Some("timeout".into());
        calendar.mark_synced(first);

        calendar.remote_sync_token = Some("token-2".into());
        calendar.mark_synced(second);

        assert_eq!(calendar.first_event_sync_date, Some(first));
        assert_eq!(calendar.last_event_sync_date, Some(second));
        assert_eq!(calendar.last_event_sync_token.as_deref(), Some("token-2"));
        assert!(calendar.error.is_none());
    }
}
