//! VCALENDAR parsing using the icalendar crate's parser.

use chrono::{NaiveDate, NaiveDateTime};
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::error::{CalSyncError, CalSyncResult};
use crate::remote::RemoteAlarm;
use crate::time::TransportTime;

/// A date or date-time as written in the ICS source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IcsTime {
    Date(NaiveDate),
    Utc(chrono::DateTime<chrono::Utc>),
    Floating(NaiveDateTime),
    Zoned { datetime: NaiveDateTime, tzid: String },
}

impl IcsTime {
    pub(crate) fn to_transport(&self) -> TransportTime {
        match self {
            IcsTime::Date(d) => TransportTime::from_date(*d),
            IcsTime::Utc(dt) => TransportTime::from_utc(*dt),
            IcsTime::Floating(dt) => TransportTime::from_floating(*dt),
            IcsTime::Zoned { datetime, tzid } => TransportTime::from_zoned(*datetime, tzid),
        }
    }

    /// `NAME:VALUE` line for the rrule parser. All-day and floating times become UTC.
    pub(crate) fn to_rrule_line(&self, name: &str) -> String {
        match self {
            IcsTime::Date(d) => format!("{}:{}T000000Z", name, d.format("%Y%m%d")),
            IcsTime::Utc(dt) => format!("{}:{}", name, dt.format("%Y%m%dT%H%M%SZ")),
            IcsTime::Floating(dt) => format!("{}:{}Z", name, dt.format("%Y%m%dT%H%M%S")),
            IcsTime::Zoned { datetime, tzid } => {
                format!("{};TZID={}:{}", name, tzid, datetime.format("%Y%m%dT%H%M%S"))
            }
        }
    }
}

/// One VEVENT, master or override.
#[derive(Debug, Clone)]
pub(crate) struct ParsedVevent {
    pub uid: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: IcsTime,
    pub end: IcsTime,
    pub rrule: Option<String>,
    pub exdates: Vec<IcsTime>,
    pub recurrence_id: Option<IcsTime>,
    pub alarms: Vec<RemoteAlarm>,
}

/// Parse every VEVENT in a VCALENDAR resource.
pub(crate) fn parse_vevents(content: &str) -> CalSyncResult<Vec<ParsedVevent>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| CalSyncError::IcsParse(e.to_string()))?;

    let vevents: Vec<ParsedVevent> = calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .map(parse_vevent)
        .collect::<CalSyncResult<_>>()?;

    if vevents.is_empty() {
        return Err(CalSyncError::IcsParse("resource has no VEVENT".into()));
    }

    Ok(vevents)
}

fn parse_vevent(vevent: &Component) -> CalSyncResult<ParsedVevent> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .ok_or_else(|| CalSyncError::IcsParse("VEVENT without UID".into()))?;

    let start = vevent
        .find_prop("DTSTART")
        .and_then(parse_time)
        .ok_or_else(|| CalSyncError::IcsParse(format!("VEVENT '{}' without DTSTART", uid)))?;

    // RFC 5545: a missing DTEND means a zero-length event (or one day for dates).
    let end = vevent
        .find_prop("DTEND")
        .and_then(parse_time)
        .unwrap_or_else(|| match &start {
            IcsTime::Date(d) => IcsTime::Date(d.succ_opt().unwrap_or(*d)),
            other => other.clone(),
        });

    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    let exdates: Vec<IcsTime> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();
    let recurrence_id = vevent.find_prop("RECURRENCE-ID").and_then(parse_time);

    let event_secs = start.to_transport().millis_until(&end.to_transport()).num_seconds();
    let start_utc = start.to_transport().utc;
    let alarms = vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .filter_map(|alarm| parse_alarm(alarm, start_utc, event_secs))
        .collect();

    Ok(ParsedVevent {
        summary: vevent.find_prop("SUMMARY").map(|p| p.val.to_string()),
        description: vevent.find_prop("DESCRIPTION").map(|p| p.val.to_string()),
        location: vevent.find_prop("LOCATION").map(|p| p.val.to_string()),
        uid,
        start,
        end,
        rrule,
        exdates,
        recurrence_id,
        alarms,
    })
}

fn parse_time(prop: &Property) -> Option<IcsTime> {
    DatePerhapsTime::try_from(prop).ok().map(to_ics_time)
}

/// Convert icalendar's DatePerhapsTime, preserving timezone info
fn to_ics_time(dpt: DatePerhapsTime) -> IcsTime {
    match dpt {
        DatePerhapsTime::Date(d) => IcsTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => IcsTime::Utc(dt),
            icalendar::CalendarDateTime::Floating(naive) => IcsTime::Floating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => IcsTime::Zoned {
                datetime: date_time,
                tzid,
            },
        },
    }
}

fn param<'a>(prop: &'a Property, key: &str) -> Option<&'a str> {
    prop.params
        .iter()
        .find(|p| p.key == key)
        .and_then(|p| p.val.as_ref())
        .map(|v| v.as_ref())
}

/// Parse an EXDATE property (TZID, VALUE=DATE, UTC, floating, comma lists).
fn parse_exdate_property(prop: &Property) -> Vec<IcsTime> {
    let tzid = param(prop, "TZID");
    let is_date = param(prop, "VALUE") == Some("DATE");

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if is_date {
                NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(IcsTime::Date)
            } else if let Some(tz) = tzid {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| IcsTime::Zoned {
                        datetime: dt,
                        tzid: tz.to_string(),
                    })
            } else if let Some(s) = s.strip_suffix('Z') {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| IcsTime::Utc(dt.and_utc()))
            } else {
                NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(IcsTime::Floating)
            }
        })
        .collect()
}

/// A VALARM as an offset in seconds from the event start.
fn parse_alarm(alarm: &Component, start_utc: i64, event_secs: i64) -> Option<RemoteAlarm> {
    let action = alarm
        .find_prop("ACTION")
        .map(|p| p.val.to_string())
        .unwrap_or_else(|| "DISPLAY".to_string());

    let trigger = alarm.find_prop("TRIGGER")?;
    let value = trigger.val.as_ref();

    let seconds = if param(trigger, "VALUE") == Some("DATE-TIME") {
        let naive = NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y%m%dT%H%M%S").ok()?;
        (naive.and_utc().timestamp_millis() - start_utc) / 1000
    } else {
        let relative = parse_trigger_seconds(value)?;
        if param(trigger, "RELATED") == Some("END") {
            relative + event_secs
        } else {
            relative
        }
    };

    Some(RemoteAlarm {
        action,
        trigger: seconds,
    })
}

/// Parse a TRIGGER duration (-PT30M, -P1D, PT0S) to signed seconds.
fn parse_trigger_seconds(value: &str) -> Option<i64> {
    let is_before = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);

    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let seconds = std_duration.as_secs() as i64;

    Some(if is_before { -seconds } else { seconds })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trigger_seconds() {
        assert_eq!(parse_trigger_seconds("-PT30M"), Some(-1800));
        assert_eq!(parse_trigger_seconds("-P1D"), Some(-86_400));
        assert_eq!(parse_trigger_seconds("PT0S"), Some(0));
        assert_eq!(parse_trigger_seconds("+PT5M"), Some(300));
        assert_eq!(parse_trigger_seconds("soon"), None);
    }

    #[test]
    fn test_parse_vevent_with_alarms() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:single-1\r\n\
SUMMARY:Dentist\r\n\
DTSTART:20250320T150000Z\r\n\
DTEND:20250320T160000Z\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
TRIGGER:-PT30M\r\n\
END:VALARM\r\n\
BEGIN:VALARM\r\n\
ACTION:AUDIO\r\n\
TRIGGER;VALUE=DATE-TIME:20250320T140000Z\r\n\
END:VALARM\r\n\
BEGIN:VALARM\r\n\
ACTION:DISPLAY\r\n\
TRIGGER;RELATED=END:PT0S\r\n\
END:VALARM\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let vevents = parse_vevents(ics).expect("Should parse");
        assert_eq!(vevents.len(), 1);

        let event = &vevents[0];
        assert_eq!(event.uid, "single-1");
        assert_eq!(event.summary.as_deref(), Some("Dentist"));
        assert!(event.rrule.is_none());

        let triggers: Vec<_> = event.alarms.iter().map(|a| a.trigger).collect();
        assert_eq!(triggers, vec![-1800, -3600, 3600]);
        assert_eq!(event.alarms[1].action, "AUDIO");
    }

    #[test]
    fn test_parse_exdate_preserves_tzid_parameter() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:test-123
SUMMARY:Recurring Event
DTSTART:20240101T100000Z
DTEND:20240101T110000Z
RRULE:FREQ=WEEKLY;BYDAY=MO
EXDATE;TZID=America/New_York:20240108T100000,20240115T100000
END:VEVENT
END:VCALENDAR"#;

        let vevents = parse_vevents(ics).expect("Should parse");
        let event = &vevents[0];

        assert_eq!(event.rrule.as_deref(), Some("FREQ=WEEKLY;BYDAY=MO"));
        assert_eq!(event.exdates.len(), 2);
        for exdate in &event.exdates {
            match exdate {
                IcsTime::Zoned { tzid, .. } => assert_eq!(tzid, "America/New_York"),
                other => panic!("Expected zoned exdate, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_missing_uid_is_error() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
DTSTART:20240101T100000Z
END:VEVENT
END:VCALENDAR"#;

        assert!(matches!(parse_vevents(ics), Err(CalSyncError::IcsParse(_))));
    }

    #[test]
    fn test_no_vevent_is_error() {
        let ics = "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:TEST\nEND:VCALENDAR";
        assert!(matches!(parse_vevents(ics), Err(CalSyncError::IcsParse(_))));
    }

    #[test]
    fn test_all_day_without_dtend_lasts_one_day() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:holiday
DTSTART;VALUE=DATE:20250101
END:VEVENT
END:VCALENDAR"#;

        let vevents = parse_vevents(ics).expect("Should parse");
        assert_eq!(
            vevents[0].end,
            IcsTime::Date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap())
        );
    }

    #[test]
    fn test_rrule_line_formats() {
        let date = IcsTime::Date(NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(date.to_rrule_line("DTSTART"), "DTSTART:20250102T000000Z");

        let zoned = IcsTime::Zoned {
            datetime: NaiveDate::from_ymd_opt(2025, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            tzid: "Europe/Paris".into(),
        };
        assert_eq!(
            zoned.to_rrule_line("EXDATE"),
            "EXDATE;TZID=Europe/Paris:20250102T093000"
        );
    }
}
