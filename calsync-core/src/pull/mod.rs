//! Pull sessions: merge one remote calendar's change stream into the store.
//!
//! A [`PullSession`] listens to a stream of [`Notification`]s, formats each
//! into local records, queues them in a [`PendingChangeSet`] and finally
//! commits the whole set in a single transaction. If the owning account is
//! removed at any point before that transaction lands, nothing from the
//! session is persisted.

mod commit;
mod pending;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::cache::UiCache;
use crate::error::{CalSyncError, CalSyncResult};
use crate::format::RecordFormatter;
use crate::records::{Account, CalendarRecord};
use crate::registry::AccountRemoval;
use crate::remote::{RemoteComponent, RemoteEvent, RemoteOccurrence};
use crate::store::Store;
use crate::stream::{Notification, NotificationReceiver};

pub use commit::{AbortReason, CommitOutcome, CommitState, CommitSummary};
pub use pending::PendingChangeSet;

/// One run of pulling and merging a single remote calendar.
pub struct PullSession {
    store: Store,
    calendar: CalendarRecord,
    account: Account,
    formatter: RecordFormatter,
    removal: AccountRemoval,
    cache: Option<Arc<dyn UiCache>>,
    pending: PendingChangeSet,
    state: CommitState,
    started: DateTime<Utc>,
}

impl PullSession {
    pub fn new(
        store: Store,
        calendar: CalendarRecord,
        account: Account,
        removal: AccountRemoval,
    ) -> CalSyncResult<Self> {
        if calendar.account_id != account.id {
            return Err(CalSyncError::AccountMismatch {
                calendar: calendar.id,
                account: account.id,
            });
        }

        Ok(PullSession {
            store,
            formatter: RecordFormatter::new(calendar.id.clone()),
            calendar,
            account,
            removal,
            cache: None,
            pending: PendingChangeSet::default(),
            state: CommitState::Idle,
            started: Utc::now(),
        })
    }

    pub fn with_cache(mut self, cache: Arc<dyn UiCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn calendar(&self) -> &CalendarRecord {
        &self.calendar
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn pending(&self) -> &PendingChangeSet {
        &self.pending
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    pub fn handle(&mut self, notification: Notification) {
        if self.state != CommitState::Idle {
            warn!(
                calendar_id = %self.calendar.id,
                kind = notification.kind(),
                "notification after commit ignored"
            );
            return;
        }

        match notification {
            Notification::Event(event) => self.handle_event_sync(event),
            Notification::Component(component) => self.handle_component_sync(component),
            Notification::MissingEvents(ids) => self.handle_missing_events(ids),
            Notification::Occurrence(occurrence) => self.handle_occurrence_sync(occurrence),
        }
    }

    /// Queue an event followed by its exceptions.
    pub fn handle_event_sync(&mut self, event: RemoteEvent) {
        for record in self.formatter.format_event_with_exceptions(&event) {
            if let Some(cache) = &self.cache {
                cache.cache_event(&record);
            }
            self.pending.event_queue.push(record);
        }
    }

    pub fn handle_component_sync(&mut self, component: RemoteComponent) {
        let record = self.formatter.format_component(&component);
        self.pending.ical_queue.push(record);
    }

    /// Queue the busytime for an occurrence and its extracted alarms.
    pub fn handle_occurrence_sync(&mut self, occurrence: RemoteOccurrence) {
        let projection = self.formatter.format_busytime(&occurrence);

        if let Some(cache) = &self.cache {
            cache.cache_busytime(&projection.busytime);
        }
        self.pending.busytime_queue.push(projection.busytime);
        self.pending.alarm_queue.extend(projection.alarms);
    }

    /// Replace the removal list. A later instruction overrides an earlier one.
    pub fn handle_missing_events(&mut self, remote_ids: Vec<String>) {
        debug!(calendar_id = %self.calendar.id, count = remote_ids.len(), "missing events");
        self.pending.remove_list = Some(remote_ids);
    }

    /// Handle notifications in order until the stream closes.
    ///
    /// Stops reading early once the account is removed; the commit will abort
    /// regardless of what else arrives. Returns the number handled.
    pub async fn consume(&mut self, mut stream: NotificationReceiver) -> usize {
        let mut removal = self.removal.clone();
        let mut handled = 0;

        loop {
            tokio::select! {
                biased;
                _ = removal.removed() => {
                    warn!(calendar_id = %self.calendar.id, handled, "account removed while pulling");
                    break;
                }
                next = stream.recv() => match next {
                    Some(notification) => {
                        self.handle(notification);
                        handled += 1;
                    }
                    None => break,
                },
            }
        }

        handled
    }

    /// Write every queued change in one transaction.
    ///
    /// Store failures and account removal are reported as
    /// [`CommitOutcome::Aborted`]; the only error is committing a session that
    /// already finished.
    #[instrument(skip(self), fields(calendar_id = %self.calendar.id))]
    pub async fn commit(&mut self) -> CalSyncResult<CommitOutcome> {
        if self.state != CommitState::Idle {
            return Err(CalSyncError::SessionFinished);
        }

        self.state = CommitState::Committing;
        let pending = std::mem::take(&mut self.pending);

        let outcome = commit::commit_changes(
            &self.store,
            self.calendar.clone(),
            self.started,
            pending,
            &self.removal,
        )
        .await;

        self.state = outcome.state();
        Ok(outcome)
    }
}
