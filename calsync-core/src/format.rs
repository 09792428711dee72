//! Conversion of remote payloads into local records.

use crate::ids;
use crate::records::{IcalComponentRecord, LocalAlarm, LocalBusytime, LocalEvent};
use crate::remote::{RemoteComponent, RemoteEvent, RemoteOccurrence};

/// A busytime plus the alarms extracted from its occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct BusytimeProjection {
    pub busytime: LocalBusytime,
    pub alarms: Vec<LocalAlarm>,
}

/// Formats remote payloads for one calendar.
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    calendar_id: String,
}

impl RecordFormatter {
    pub fn new(calendar_id: impl Into<String>) -> Self {
        RecordFormatter {
            calendar_id: calendar_id.into(),
        }
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// Format a single remote event. Any `exceptions` are dropped from the copy;
    /// use [`RecordFormatter::format_event_with_exceptions`] to get them too.
    pub fn format_event(&self, event: &RemoteEvent) -> LocalEvent {
        let mut remote = event.clone();
        remote.exceptions = None;

        let parent_id = event
            .recurrence_id
            .as_ref()
            .map(|_| ids::parent_id_for(&self.calendar_id, event));

        LocalEvent {
            id: ids::event_id_for(&self.calendar_id, event),
            calendar_id: self.calendar_id.clone(),
            parent_id,
            remote,
        }
    }

    /// The event followed by each of its exceptions, in document order.
    pub fn format_event_with_exceptions(&self, event: &RemoteEvent) -> Vec<LocalEvent> {
        let exceptions = event.exceptions.as_deref().unwrap_or_default();

        let mut records = Vec::with_capacity(1 + exceptions.len());
        records.push(self.format_event(event));
        records.extend(exceptions.iter().map(|exception| self.format_event(exception)));
        records
    }

    /// Project an occurrence into a busytime and its alarms.
    pub fn format_busytime(&self, occurrence: &RemoteOccurrence) -> BusytimeProjection {
        let event_id = ids::occurrence_event_id(&self.calendar_id, occurrence);
        let busytime_id = ids::busytime_id(&self.calendar_id, occurrence);

        let alarms = occurrence
            .alarms
            .iter()
            .flatten()
            .enumerate()
            .map(|(index, alarm)| LocalAlarm {
                id: ids::alarm_id(&busytime_id, index),
                busytime_id: busytime_id.clone(),
                event_id: event_id.clone(),
                start_date: occurrence.start.shifted_by_secs(alarm.trigger),
                action: alarm.action.clone(),
                trigger: alarm.trigger,
            })
            .collect();

        BusytimeProjection {
            busytime: LocalBusytime {
                id: busytime_id,
                event_id,
                calendar_id: self.calendar_id.clone(),
                start: occurrence.start.clone(),
                end: occurrence.end.clone(),
            },
            alarms,
        }
    }

    /// Key a component by its event's local id.
    pub fn format_component(&self, component: &RemoteComponent) -> IcalComponentRecord {
        IcalComponentRecord {
            event_id: ids::derive_id(&self.calendar_id, &component.event_id, None),
            calendar_id: self.calendar_id.clone(),
            ical: component.ical.clone(),
            is_recurring: component.is_recurring,
            last_recurrence_id: component.last_recurrence_id.clone(),
        }
    }
}
