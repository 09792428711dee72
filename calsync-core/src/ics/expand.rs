//! RRULE expansion into remote occurrences.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rrule::RRuleSet;

use super::parse::{IcsTime, ParsedVevent};
use crate::config::ExpansionConfig;
use crate::error::{CalSyncError, CalSyncResult};
use crate::remote::{RemoteAlarm, RemoteOccurrence};
use crate::time::TransportTime;

/// Instances of one series, plus whether the rule produced more than were expanded.
#[derive(Debug, Clone)]
pub(crate) struct Expansion {
    pub occurrences: Vec<RemoteOccurrence>,
    pub truncated: bool,
}

impl Expansion {
    /// The recurrence id to resume from, only when the series was cut short.
    pub fn last_recurrence_id(&self) -> Option<TransportTime> {
        if !self.truncated {
            return None;
        }
        self.occurrences.last().map(|o| o.recurrence_id.clone())
    }
}

/// Expand `master` within `now ± window_days`, applying `overrides` by recurrence id.
pub(crate) fn expand(
    master: &ParsedVevent,
    overrides: &[ParsedVevent],
    expansion: &ExpansionConfig,
    now: DateTime<Utc>,
) -> CalSyncResult<Expansion> {
    let Some(rrule) = &master.rrule else {
        return Ok(single(master));
    };

    let rrule_set = build_rrule_set(master, rrule)?;

    let (from, until) = window(now, expansion.window_days)?;
    let tz: rrule::Tz = Utc.into();
    let limit = u16::try_from(expansion.max_occurrences).unwrap_or(u16::MAX);
    let result = rrule_set
        .clone()
        .after(from.with_timezone(&tz))
        .before(until.with_timezone(&tz))
        .all(limit);

    let truncated = match result.dates.last() {
        Some(last) => !rrule_set.after(last.clone()).all(1).dates.is_empty(),
        None => false,
    };

    let overrides_by_rid: HashMap<i64, &ParsedVevent> = overrides
        .iter()
        .filter_map(|o| o.recurrence_id.as_ref().map(|rid| (rid.to_transport().utc, o)))
        .collect();

    let start = master.start.to_transport();
    let duration_secs = start.millis_until(&master.end.to_transport()).num_seconds();

    let occurrences = result
        .dates
        .iter()
        .map(|dt| {
            let recurrence_id = occurrence_time(dt, &master.start);
            match overrides_by_rid.get(&recurrence_id.utc) {
                Some(over) => RemoteOccurrence {
                    event_id: master.uid.clone(),
                    recurrence_id,
                    start: over.start.to_transport(),
                    end: over.end.to_transport(),
                    is_exception: true,
                    alarms: alarms(&over.alarms),
                },
                None => RemoteOccurrence {
                    event_id: master.uid.clone(),
                    end: recurrence_id.shifted_by_secs(duration_secs),
                    start: recurrence_id.clone(),
                    recurrence_id,
                    is_exception: false,
                    alarms: alarms(&master.alarms),
                },
            }
        })
        .collect();

    Ok(Expansion {
        occurrences,
        truncated,
    })
}

/// Bounds for expansion. `after` is exclusive, so the lower bound is moved back
/// one second to keep an occurrence that falls exactly on it.
fn window(now: DateTime<Utc>, days: i64) -> CalSyncResult<(DateTime<Utc>, DateTime<Utc>)> {
    let out_of_range =
        || CalSyncError::Config(format!("expansion window of {} days is out of range", days));

    if days < 0 {
        return Err(out_of_range());
    }
    let span = Duration::try_days(days).ok_or_else(out_of_range)?;

    let from = now
        .checked_sub_signed(span)
        .and_then(|t| t.checked_sub_signed(Duration::seconds(1)))
        .ok_or_else(out_of_range)?;
    let until = now.checked_add_signed(span).ok_or_else(out_of_range)?;
    Ok((from, until))
}

/// A non-recurring event is its own single occurrence.
fn single(event: &ParsedVevent) -> Expansion {
    let start = event.start.to_transport();
    Expansion {
        occurrences: vec![RemoteOccurrence {
            event_id: event.uid.clone(),
            recurrence_id: start.clone(),
            start,
            end: event.end.to_transport(),
            is_exception: false,
            alarms: alarms(&event.alarms),
        }],
        truncated: false,
    }
}

fn alarms(alarms: &[RemoteAlarm]) -> Option<Vec<RemoteAlarm>> {
    if alarms.is_empty() {
        None
    } else {
        Some(alarms.to_vec())
    }
}

fn build_rrule_set(master: &ParsedVevent, rrule: &str) -> CalSyncResult<RRuleSet> {
    let mut lines = vec![master.start.to_rrule_line("DTSTART"), format!("RRULE:{}", rrule)];
    lines.extend(master.exdates.iter().map(|ex| ex.to_rrule_line("EXDATE")));

    lines.join("\n").parse().map_err(|e| {
        CalSyncError::IcsParse(format!(
            "Failed to parse RRULE for event '{}': {}",
            master.uid, e
        ))
    })
}

/// Convert an rrule instant back to transport time, following the master's variant.
fn occurrence_time(dt: &DateTime<rrule::Tz>, master_start: &IcsTime) -> TransportTime {
    match master_start {
        IcsTime::Date(_) => TransportTime::from_date(dt.date_naive()),
        IcsTime::Utc(_) => TransportTime::from_utc(dt.with_timezone(&Utc)),
        IcsTime::Floating(_) => TransportTime::from_floating(dt.naive_utc()),
        IcsTime::Zoned { tzid, .. } => TransportTime::from_zoned(dt.naive_local(), tzid),
    }
}
