//! Staging area for everything one pull session wants to write.

use crate::records::{IcalComponentRecord, LocalAlarm, LocalBusytime, LocalEvent};

/// Queued mutations for one sync session, consumed once by the commit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingChangeSet {
    pub event_queue: Vec<LocalEvent>,
    pub ical_queue: Vec<IcalComponentRecord>,
    pub busytime_queue: Vec<LocalBusytime>,
    pub alarm_queue: Vec<LocalAlarm>,
    /// Remote ids to remove. `None` means no removal instruction was received,
    /// which skips the removal phase entirely; `Some(vec![])` still runs it.
    pub remove_list: Option<Vec<String>>,
}

impl PendingChangeSet {
    /// Nothing queued and no removal instruction.
    pub fn is_empty(&self) -> bool {
        self.event_queue.is_empty()
            && self.ical_queue.is_empty()
            && self.busytime_queue.is_empty()
            && self.alarm_queue.is_empty()
            && self.remove_list.is_none()
    }
}
