//! Turns a CalDAV VCALENDAR resource into a change stream.
//!
//! A resource yields, in order: the master `event` (with its RECURRENCE-ID
//! overrides as `exceptions`), its `component`, then one `occurrence` per
//! expanded instance.

mod expand;
mod parse;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::ExpansionConfig;
use crate::error::{CalSyncError, CalSyncResult};
use crate::remote::{RemoteComponent, RemoteEvent};
use crate::stream::{Notification, NotificationSender};
use parse::ParsedVevent;

/// One calendar object as fetched from a CalDAV server.
#[derive(Debug, Clone, PartialEq)]
pub struct CalDavResource {
    pub url: Option<String>,
    pub etag: Option<String>,
    pub ical: String,
}

impl CalDavResource {
    pub fn new(ical: impl Into<String>) -> Self {
        CalDavResource {
            url: None,
            etag: None,
            ical: ical.into(),
        }
    }
}

/// Produces notifications for CalDAV resources.
#[derive(Debug, Clone)]
pub struct IcsStream {
    expansion: ExpansionConfig,
}

impl IcsStream {
    pub fn new(expansion: ExpansionConfig) -> Self {
        IcsStream { expansion }
    }

    /// All notifications for `resource`, in emission order.
    pub fn notifications(
        &self,
        resource: &CalDavResource,
        now: DateTime<Utc>,
    ) -> CalSyncResult<Vec<Notification>> {
        let vevents = parse::parse_vevents(&resource.ical)?;
        let (overrides, masters): (Vec<_>, Vec<_>) = vevents
            .into_iter()
            .partition(|v| v.recurrence_id.is_some());

        // A resource holding only overrides has no series to anchor them to.
        let master = masters.into_iter().next().ok_or_else(|| {
            CalSyncError::IcsParse("resource has no master VEVENT".into())
        })?;

        let expansion = expand::expand(&master, &overrides, &self.expansion, now)?;
        let is_recurring = master.rrule.is_some();

        let mut event = remote_event(&master, resource);
        event.is_recurring = is_recurring;
        if !overrides.is_empty() {
            event.exceptions = Some(
                overrides
                    .iter()
                    .map(|over| {
                        let mut exception = remote_event(over, resource);
                        exception.event_id = Some(master.uid.clone());
                        exception
                    })
                    .collect(),
            );
        }

        let component = RemoteComponent {
            event_id: master.uid.clone(),
            ical: resource.ical.clone(),
            is_recurring,
            last_recurrence_id: expansion.last_recurrence_id(),
        };

        debug!(
            uid = %master.uid,
            occurrences = expansion.occurrences.len(),
            truncated = expansion.truncated,
            "expanded ics resource"
        );

        let mut notifications = Vec::with_capacity(2 + expansion.occurrences.len());
        notifications.push(Notification::Event(event));
        notifications.push(Notification::Component(component));
        notifications.extend(expansion.occurrences.into_iter().map(Notification::Occurrence));
        Ok(notifications)
    }

    /// Send every notification for `resource` down `sender`. Returns how many were sent.
    pub fn emit(
        &self,
        resource: &CalDavResource,
        now: DateTime<Utc>,
        sender: &NotificationSender,
    ) -> CalSyncResult<usize> {
        let notifications = self.notifications(resource, now)?;
        let count = notifications.len();
        for notification in notifications {
            sender.send(notification)?;
        }
        Ok(count)
    }
}

fn remote_event(vevent: &ParsedVevent, resource: &CalDavResource) -> RemoteEvent {
    RemoteEvent {
        id: vevent.uid.clone(),
        event_id: None,
        url: resource.url.clone(),
        sync_token: resource.etag.clone(),
        title: vevent.summary.clone(),
        description: vevent.description.clone(),
        location: vevent.location.clone(),
        start: vevent.start.to_transport(),
        end: vevent.end.to_transport(),
        is_recurring: false,
        recurrence_id: vevent.recurrence_id.as_ref().map(|rid| rid.to_transport()),
        exceptions: None,
        alarms: vevent.alarms.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream;
    use chrono::TimeZone;

    const RECURRING: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:series-1\r\n\
SUMMARY:Planning\r\n\
LOCATION:Room 4\r\n\
DTSTART;TZID=Europe/Paris:20250303T100000\r\n\
DTEND;TZID=Europe/Paris:20250303T110000\r\n\
RRULE:FREQ=DAILY;COUNT=3\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
TRIGGER:-PT15M\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:series-1\r\n\
RECURRENCE-ID;TZID=Europe/Paris:20250304T100000\r\n\
SUMMARY:Planning (late)\r\n\
DTSTART;TZID=Europe/Paris:20250304T140000\r\n\
DTEND;TZID=Europe/Paris:20250304T150000\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

    fn resource(ical: &str) -> CalDavResource {
        CalDavResource {
            url: Some("/cal/series-1.ics".into()),
            etag: Some("\"etag-7\"".into()),
            ical: ical.into(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_notifications_order_event_component_occurrences() {
        let producer = IcsStream::new(ExpansionConfig::default());
        let notifications = producer.notifications(&resource(RECURRING), now()).unwrap();

        let kinds: Vec<_> = notifications.iter().map(Notification::kind).collect();
        assert_eq!(
            kinds,
            vec!["event", "component", "occurrence", "occurrence", "occurrence"]
        );
    }

    #[test]
    fn test_master_event_carries_exceptions() {
        let producer = IcsStream::new(ExpansionConfig::default());
        let notifications = producer.notifications(&resource(RECURRING), now()).unwrap();

        let Notification::Event(event) = &notifications[0] else {
            panic!("Expected event first");
        };
        assert_eq!(event.id, "series-1");
        assert!(event.is_recurring);
        assert_eq!(event.sync_token.as_deref(), Some("\"etag-7\""));
        assert_eq!(event.url.as_deref(), Some("/cal/series-1.ics"));
        assert_eq!(event.location.as_deref(), Some("Room 4"));
        assert_eq!(event.start.tzid.as_deref(), Some("Europe/Paris"));
        assert_eq!(event.alarms.len(), 1);

        let exceptions = event.exceptions.as_ref().expect("Should have exceptions");
        assert_eq!(exceptions.len(), 1);
        assert_eq!(exceptions[0].event_id.as_deref(), Some("series-1"));
        assert_eq!(exceptions[0].title.as_deref(), Some("Planning (late)"));
        assert!(exceptions[0].recurrence_id.is_some());
        assert!(exceptions[0].exceptions.is_none());
    }

    #[test]
    fn test_complete_series_has_no_last_recurrence_id() {
        let producer = IcsStream::new(ExpansionConfig::default());
        let notifications = producer.notifications(&resource(RECURRING), now()).unwrap();

        let Notification::Component(component) = &notifications[1] else {
            panic!("Expected component second");
        };
        assert_eq!(component.event_id, "series-1");
        assert!(component.is_recurring);
        assert!(component.last_recurrence_id.is_none());
        assert_eq!(component.ical, RECURRING);
    }

    #[test]
    fn test_overridden_occurrence_is_exception() {
        let producer = IcsStream::new(ExpansionConfig::default());
        let notifications = producer.notifications(&resource(RECURRING), now()).unwrap();

        let occurrences: Vec<_> = notifications
            .iter()
            .filter_map(|n| match n {
                Notification::Occurrence(o) => Some(o),
                _ => None,
            })
            .collect();

        assert!(!occurrences[0].is_exception);
        assert!(occurrences[1].is_exception);
        assert!(!occurrences[2].is_exception);

        // 14:00 Paris (CET) is 13:00 UTC
        let late = Utc.with_ymd_and_hms(2025, 3, 4, 13, 0, 0).unwrap();
        assert_eq!(occurrences[1].start.utc, late.timestamp_millis());
        let planned = Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap();
        assert_eq!(occurrences[1].recurrence_id.utc, planned.timestamp_millis());
        assert_eq!(occurrences[0].alarms.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_truncated_series_sets_last_recurrence_id() {
        let producer = IcsStream::new(ExpansionConfig {
            window_days: 180,
            max_occurrences: 2,
        });
        let notifications = producer.notifications(&resource(RECURRING), now()).unwrap();

        let Notification::Component(component) = &notifications[1] else {
            panic!("Expected component second");
        };
        let Notification::Occurrence(last) = &notifications[3] else {
            panic!("Expected occurrence");
        };
        assert_eq!(component.last_recurrence_id.as_ref(), Some(&last.recurrence_id));
    }

    #[test]
    fn test_overrides_without_master_is_error() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:orphan
RECURRENCE-ID:20250304T100000Z
DTSTART:20250304T140000Z
DTEND:20250304T150000Z
END:VEVENT
END:VCALENDAR"#;

        let producer = IcsStream::new(ExpansionConfig::default());
        let result = producer.notifications(&CalDavResource::new(ics), now());
        assert!(matches!(result, Err(CalSyncError::IcsParse(_))));
    }

    #[tokio::test]
    async fn test_emit_preserves_order_on_channel() {
        let producer = IcsStream::new(ExpansionConfig::default());
        let (tx, mut rx) = stream::channel();

        let sent = producer.emit(&resource(RECURRING), now(), &tx).unwrap();
        drop(tx);
        assert_eq!(sent, 5);

        let mut kinds = Vec::new();
        while let Some(notification) = rx.recv().await {
            kinds.push(notification.kind());
        }
        assert_eq!(kinds.first(), Some(&"event"));
        assert_eq!(kinds.len(), 5);
    }
}
