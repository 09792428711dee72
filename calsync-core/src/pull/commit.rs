//! Applies a [`PendingChangeSet`] to the store in one transaction.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::pending::PendingChangeSet;
use crate::error::CalSyncError;
use crate::ids;
use crate::records::CalendarRecord;
use crate::registry::AccountRemoval;
use crate::store::{Store, Transaction};

/// Lifecycle of a session's commit. `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Idle,
    Committing,
    Committed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// The owning account was removed before or during the commit.
    AccountRemoved,
    /// The store rejected the transaction.
    StoreWrite(String),
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::AccountRemoved => write!(f, "account removed"),
            AbortReason::StoreWrite(e) => write!(f, "store write failed: {}", e),
        }
    }
}

/// What a successful commit wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Remote ids from the removal instruction.
    pub removal_requests: usize,
    /// Event rows actually removed, exceptions included.
    pub removed_events: usize,
    pub ical_components: usize,
    pub events: usize,
    pub busytimes: usize,
    pub alarms: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(CommitSummary),
    Aborted(AbortReason),
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitOutcome::Committed(_))
    }

    pub fn state(&self) -> CommitState {
        match self {
            CommitOutcome::Committed(_) => CommitState::Committed,
            CommitOutcome::Aborted(_) => CommitState::Aborted,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Remove,
    IcalComponents,
    Events,
    Busytimes,
    Alarms,
    Calendar,
}

impl Phase {
    /// Busytimes must never become visible before the events they reference.
    const ORDER: [Phase; 6] = [
        Phase::Remove,
        Phase::IcalComponents,
        Phase::Events,
        Phase::Busytimes,
        Phase::Alarms,
        Phase::Calendar,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Remove => "remove",
            Phase::IcalComponents => "ical_components",
            Phase::Events => "events",
            Phase::Busytimes => "busytimes",
            Phase::Alarms => "alarms",
            Phase::Calendar => "calendar",
        };
        f.write_str(name)
    }
}

/// Stage every phase into one transaction and apply it.
///
/// The removal signal is checked before the transaction is opened and after
/// each phase; a removed account discards the whole transaction. The account
/// is also required by the transaction itself, so a removal committed by
/// another process before the write lock is taken aborts the commit too.
pub(super) async fn commit_changes(
    store: &Store,
    mut calendar: CalendarRecord,
    started: DateTime<Utc>,
    mut pending: PendingChangeSet,
    removal: &AccountRemoval,
) -> CommitOutcome {
    if removal.is_removed() {
        warn!(calendar_id = %calendar.id, "account removed before commit; nothing written");
        return CommitOutcome::Aborted(AbortReason::AccountRemoved);
    }

    let mut summary = CommitSummary {
        removal_requests: pending.remove_list.as_ref().map_or(0, Vec::len),
        removed_events: 0,
        ical_components: pending.ical_queue.len(),
        events: pending.event_queue.len(),
        busytimes: pending.busytime_queue.len(),
        alarms: pending.alarm_queue.len(),
    };

    let mut tx = store.transaction();
    tx.require_account(calendar.account_id.clone());

    for phase in Phase::ORDER {
        stage(&mut tx, phase, &mut pending, &mut calendar, started);

        debug!(calendar_id = %calendar.id, %phase, staged = tx.len(), "commit phase staged");
        tokio::task::yield_now().await;

        if removal.is_removed() {
            let discarded = tx.abort();
            warn!(
                calendar_id = %calendar.id,
                %phase,
                discarded,
                "account removed during commit; transaction aborted"
            );
            return CommitOutcome::Aborted(AbortReason::AccountRemoved);
        }
    }

    // File locking and the snapshot write block.
    let committed = match tokio::task::spawn_blocking(move || tx.commit()).await {
        Ok(result) => result,
        Err(e) => {
            warn!(calendar_id = %calendar.id, error = %e, "commit task failed");
            return CommitOutcome::Aborted(AbortReason::StoreWrite(e.to_string()));
        }
    };

    match committed {
        Ok(tx_summary) => {
            summary.removed_events = tx_summary.removed_events;
            info!(
                calendar_id = %calendar.id,
                events = summary.events,
                busytimes = summary.busytimes,
                alarms = summary.alarms,
                removed = summary.removed_events,
                "sync committed"
            );
            CommitOutcome::Committed(summary)
        }
        Err(CalSyncError::AccountNotFound(account_id)) => {
            warn!(
                calendar_id = %calendar.id,
                %account_id,
                "account removed by another writer; transaction aborted"
            );
            CommitOutcome::Aborted(AbortReason::AccountRemoved)
        }
        Err(e) => {
            warn!(calendar_id = %calendar.id, error = %e, "sync transaction failed");
            CommitOutcome::Aborted(AbortReason::StoreWrite(e.to_string()))
        }
    }
}

/// Move one phase's share of the pending changes into the transaction.
fn stage(
    tx: &mut Transaction,
    phase: Phase,
    pending: &mut PendingChangeSet,
    calendar: &mut CalendarRecord,
    started: DateTime<Utc>,
) {
    match phase {
        Phase::Remove => {
            for remote_id in pending.remove_list.take().into_iter().flatten() {
                tx.remove_event(ids::derive_id(&calendar.id, &remote_id, None));
            }
        }
        Phase::IcalComponents => {
            for component in std::mem::take(&mut pending.ical_queue) {
                tx.put_ical_component(component);
            }
        }
        Phase::Events => {
            for event in std::mem::take(&mut pending.event_queue) {
                tx.put_event(event);
            }
        }
        Phase::Busytimes => {
            for busytime in std::mem::take(&mut pending.busytime_queue) {
                tx.put_busytime(busytime);
            }
        }
        Phase::Alarms => {
            for alarm in std::mem::take(&mut pending.alarm_queue) {
                tx.put_alarm(alarm);
            }
        }
        Phase::Calendar => {
            calendar.mark_synced(started);
            tx.put_calendar(calendar.clone());
        }
    }
}
