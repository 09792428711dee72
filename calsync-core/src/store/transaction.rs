//! Staged, all-or-nothing writes against a [`Store`].

use std::collections::HashSet;

use tracing::debug;

use super::{Store, StoreData};
use crate::error::{CalSyncError, CalSyncResult};
use crate::records::{
    Account, CalendarRecord, IcalComponentRecord, LocalAlarm, LocalBusytime, LocalEvent,
};

enum Op {
    RequireAccount(String),
    PutAccount(Account),
    PutCalendar(CalendarRecord),
    PutEvent(LocalEvent),
    PutIcalComponent(IcalComponentRecord),
    PutBusytime(LocalBusytime),
    PutAlarm(LocalAlarm),
    RemoveEvent(String),
    RemoveAccount(String),
}

/// What a committed transaction changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxSummary {
    pub removed_events: usize,
}

/// A set of writes that become visible together on [`Transaction::commit`].
///
/// Operations are applied in the order they were staged. Dropping a
/// transaction without committing discards it.
pub struct Transaction {
    store: Store,
    ops: Vec<Op>,
}

impl Transaction {
    pub(super) fn new(store: Store) -> Self {
        Transaction {
            store,
            ops: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Fail the commit with [`CalSyncError::AccountNotFound`] unless the
    /// account still exists when the transaction is applied.
    pub fn require_account(&mut self, account_id: impl Into<String>) {
        self.ops.push(Op::RequireAccount(account_id.into()));
    }

    pub fn put_account(&mut self, account: Account) {
        self.ops.push(Op::PutAccount(account));
    }

    pub fn put_calendar(&mut self, calendar: CalendarRecord) {
        self.ops.push(Op::PutCalendar(calendar));
    }

    pub fn put_event(&mut self, event: LocalEvent) {
        self.ops.push(Op::PutEvent(event));
    }

    pub fn put_ical_component(&mut self, component: IcalComponentRecord) {
        self.ops.push(Op::PutIcalComponent(component));
    }

    pub fn put_busytime(&mut self, busytime: LocalBusytime) {
        self.ops.push(Op::PutBusytime(busytime));
    }

    pub fn put_alarm(&mut self, alarm: LocalAlarm) {
        self.ops.push(Op::PutAlarm(alarm));
    }

    /// Remove an event along with its exceptions, busytimes, alarms and ical component.
    pub fn remove_event(&mut self, event_id: impl Into<String>) {
        self.ops.push(Op::RemoveEvent(event_id.into()));
    }

    /// Remove an account, its calendars and every record synced into them.
    pub fn remove_account(&mut self, account_id: impl Into<String>) {
        self.ops.push(Op::RemoveAccount(account_id.into()));
    }

    /// Discard every staged operation. Returns how many were dropped.
    pub fn abort(self) -> usize {
        let discarded = self.ops.len();
        debug!(discarded, "transaction aborted");
        discarded
    }

    /// Apply every staged operation, or none of them.
    ///
    /// Operations are applied to the store's current contents, re-read under
    /// the write lock, so writes committed through other handles are kept.
    pub fn commit(self) -> CalSyncResult<TxSummary> {
        let operations = self.ops.len();
        let _guard = self.store.begin_write()?;

        let mut next = self.store.latest()?;
        let mut summary = TxSummary::default();

        for op in self.ops {
            summary.removed_events += apply(&mut next, op)?;
        }

        self.store.persist(&next)?;
        *self.store.lock() = next;

        debug!(
            operations,
            removed_events = summary.removed_events,
            "transaction committed"
        );
        Ok(summary)
    }
}

fn require_key(kind: &str, key: &str) -> CalSyncResult<()> {
    if key.is_empty() {
        return Err(CalSyncError::InvalidRecord(format!("{} with empty key", kind)));
    }
    Ok(())
}

/// Apply one operation. Returns the number of event records removed.
fn apply(data: &mut StoreData, op: Op) -> CalSyncResult<usize> {
    match op {
        Op::RequireAccount(account_id) => {
            if !data.accounts.contains_key(&account_id) {
                return Err(CalSyncError::AccountNotFound(account_id));
            }
        }
        Op::PutAccount(account) => {
            require_key("account", &account.id)?;
            data.accounts.insert(account.id.clone(), account);
        }
        Op::PutCalendar(calendar) => {
            require_key("calendar", &calendar.id)?;
            data.calendars.insert(calendar.id.clone(), calendar);
        }
        Op::PutEvent(event) => {
            if event.remote.id.is_empty() {
                return Err(CalSyncError::InvalidRecord(format!(
                    "event '{}' has no remote id",
                    event.id
                )));
            }
            data.events.insert(event.id.clone(), event);
        }
        Op::PutIcalComponent(component) => {
            require_key("ical component", &component.event_id)?;
            data.ical_components
                .insert(component.event_id.clone(), component);
        }
        Op::PutBusytime(busytime) => {
            require_key("busytime", &busytime.id)?;
            // The alarms staged after it are the busytime's complete alarm set.
            data.alarms.retain(|_, a| a.busytime_id != busytime.id);
            data.busytimes.insert(busytime.id.clone(), busytime);
        }
        Op::PutAlarm(alarm) => {
            require_key("alarm", &alarm.id)?;
            data.alarms.insert(alarm.id.clone(), alarm);
        }
        Op::RemoveEvent(event_id) => {
            let mut removed: HashSet<String> = data
                .events
                .values()
                .filter(|e| e.parent_id.as_deref() == Some(event_id.as_str()))
                .map(|e| e.id.clone())
                .collect();
            removed.insert(event_id);

            return Ok(remove_events(data, &removed));
        }
        Op::RemoveAccount(account_id) => {
            data.accounts.remove(&account_id);

            let calendars: HashSet<String> = data
                .calendars
                .values()
                .filter(|c| c.account_id == account_id)
                .map(|c| c.id.clone())
                .collect();
            data.calendars.retain(|id, _| !calendars.contains(id));

            let removed: HashSet<String> = data
                .events
                .values()
                .filter(|e| calendars.contains(&e.calendar_id))
                .map(|e| e.id.clone())
                .collect();
            let count = remove_events(data, &removed);

            // Busytimes and components can exist without their event row.
            let orphaned: HashSet<String> = data
                .busytimes
                .values()
                .filter(|b| calendars.contains(&b.calendar_id))
                .map(|b| b.id.clone())
                .collect();
            data.busytimes.retain(|id, _| !orphaned.contains(id));
            data.alarms.retain(|_, a| !orphaned.contains(&a.busytime_id));
            data.ical_components
                .retain(|_, c| !calendars.contains(&c.calendar_id));

            return Ok(count);
        }
    }

    Ok(0)
}

/// Drop events by id and everything that references them.
fn remove_events(data: &mut StoreData, removed: &HashSet<String>) -> usize {
    let before = data.events.len();

    data.events.retain(|id, _| !removed.contains(id));
    data.busytimes.retain(|_, b| !removed.contains(&b.event_id));
    data.alarms.retain(|_, a| !removed.contains(&a.event_id));
    data.ical_components.retain(|id, _| !removed.contains(id));

    before - data.events.len()
}
