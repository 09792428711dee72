//! Stable local identifiers for remote events, occurrences and alarms.
//!
//! Every id here is a pure function of its inputs, so re-syncing the same
//! remote data always lands on the same local keys.

use crate::remote::{RemoteEvent, RemoteOccurrence};
use crate::time::TransportTime;

/// `<calendar>-<remote id>`, or `<calendar>-<remote id>-<recurrence utc>` for exceptions.
pub fn derive_id(calendar_id: &str, remote_id: &str, recurrence_id: Option<&TransportTime>) -> String {
    match recurrence_id {
        Some(rid) => format!("{}-{}-{}", calendar_id, remote_id, rid.utc),
        None => format!("{}-{}", calendar_id, remote_id),
    }
}

/// Local id of a remote event (exception ids include their recurrence id).
pub fn event_id_for(calendar_id: &str, event: &RemoteEvent) -> String {
    derive_id(calendar_id, &event.id, event.recurrence_id.as_ref())
}

/// Local id of the master event an exception belongs to.
pub fn parent_id_for(calendar_id: &str, exception: &RemoteEvent) -> String {
    let parent = exception.event_id.as_deref().unwrap_or(&exception.id);
    derive_id(calendar_id, parent, None)
}

/// Local id of the event an occurrence belongs to.
///
/// Instances of an exception point at the exception record; plain instances of
/// a series point at the master.
pub fn occurrence_event_id(calendar_id: &str, occurrence: &RemoteOccurrence) -> String {
    let rid = occurrence.is_exception.then_some(&occurrence.recurrence_id);
    derive_id(calendar_id, &occurrence.event_id, rid)
}

/// `<occurrence event id>-<recurrence utc>`.
pub fn busytime_id(calendar_id: &str, occurrence: &RemoteOccurrence) -> String {
    format!(
        "{}-{}",
        occurrence_event_id(calendar_id, occurrence),
        occurrence.recurrence_id.utc
    )
}

/// `<busytime id>-<index>`, where `index` is the alarm's position on its occurrence.
pub fn alarm_id(busytime_id: &str, index: usize) -> String {
    format!("{}-{}", busytime_id, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(utc: i64) -> TransportTime {
        TransportTime {
            utc,
            offset: 0,
            tzid: None,
        }
    }

    fn occurrence(is_exception: bool) -> RemoteOccurrence {
        RemoteOccurrence {
            event_id: "uid-1".into(),
            recurrence_id: time(100),
            start: time(100),
            end: time(200),
            is_exception,
            alarms: None,
        }
    }

    #[test]
    fn test_derive_id_is_deterministic() {
        let rid = time(100);
        assert_eq!(derive_id("cal", "uid-1", None), derive_id("cal", "uid-1", None));
        assert_eq!(
            derive_id("cal", "uid-1", Some(&rid)),
            derive_id("cal", "uid-1", Some(&rid.clone()))
        );
    }

    #[test]
    fn test_exception_id_extends_parent_id() {
        let rid = time(100);
        let parent = derive_id("cal", "uid-1", None);
        let exception = derive_id("cal", "uid-1", Some(&rid));

        assert_eq!(parent, "cal-uid-1");
        assert_eq!(exception, "cal-uid-1-100");
        assert_ne!(parent, exception);
    }

    #[test]
    fn test_occurrence_event_id_only_composite_for_exceptions() {
        assert_eq!(occurrence_event_id("cal", &occurrence(false)), "cal-uid-1");
        assert_eq!(occurrence_event_id("cal", &occurrence(true)), "cal-uid-1-100");
    }

    #[test]
    fn test_busytime_id() {
        assert_eq!(busytime_id("cal", &occurrence(false)), "cal-uid-1-100");
        assert_eq!(busytime_id("cal", &occurrence(true)), "cal-uid-1-100-100");
        assert_eq!(alarm_id("cal-uid-1-100", 1), "cal-uid-1-100-1");
    }
}
