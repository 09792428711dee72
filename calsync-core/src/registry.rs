//! Accounts and calendars known to this process, and account-removal signals.

use std::collections::HashMap;

use tokio::sync::watch;
use tracing::info;

use crate::error::{CalSyncError, CalSyncResult};
use crate::records::{Account, CalendarRecord};
use crate::store::Store;

/// Observes whether an account has been removed.
///
/// Once flipped, the signal stays set even after the registry forgets the
/// account.
#[derive(Debug, Clone)]
pub struct AccountRemoval {
    rx: watch::Receiver<bool>,
}

impl AccountRemoval {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        AccountRemoval { rx }
    }

    pub fn is_removed(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the account is removed. Pending forever if it never is.
    pub async fn removed(&mut self) {
        if self.rx.wait_for(|removed| *removed).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

struct AccountEntry {
    account: Account,
    removal: watch::Sender<bool>,
}

/// Registry of accounts and their calendars.
#[derive(Default)]
pub struct AccountRegistry {
    accounts: HashMap<String, AccountEntry>,
    calendars: HashMap<String, CalendarRecord>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the accounts and calendars persisted in `store`.
    pub fn load(store: &Store) -> Self {
        let mut registry = AccountRegistry::new();
        for account in store.accounts() {
            registry.register_account(account);
        }
        for calendar in store.calendars() {
            registry.calendars.insert(calendar.id.clone(), calendar);
        }
        registry
    }

    pub fn register_account(&mut self, account: Account) {
        let (removal, _) = watch::channel(false);
        self.accounts
            .insert(account.id.clone(), AccountEntry { account, removal });
    }

    pub fn register_calendar(&mut self, calendar: CalendarRecord) -> CalSyncResult<()> {
        if !self.accounts.contains_key(&calendar.account_id) {
            return Err(CalSyncError::AccountNotFound(calendar.account_id));
        }
        self.calendars.insert(calendar.id.clone(), calendar);
        Ok(())
    }

    pub fn account(&self, id: &str) -> CalSyncResult<&Account> {
        self.accounts
            .get(id)
            .map(|entry| &entry.account)
            .ok_or_else(|| CalSyncError::AccountNotFound(id.to_string()))
    }

    pub fn calendar(&self, id: &str) -> CalSyncResult<&CalendarRecord> {
        self.calendars
            .get(id)
            .ok_or_else(|| CalSyncError::CalendarNotFound(id.to_string()))
    }

    pub fn calendars_for(&self, account_id: &str) -> Vec<&CalendarRecord> {
        self.calendars
            .values()
            .filter(|c| c.account_id == account_id)
            .collect()
    }

    /// Subscribe to removal of `account_id`.
    pub fn watch_removal(&self, account_id: &str) -> CalSyncResult<AccountRemoval> {
        let entry = self
            .accounts
            .get(account_id)
            .ok_or_else(|| CalSyncError::AccountNotFound(account_id.to_string()))?;

        Ok(AccountRemoval {
            rx: entry.removal.subscribe(),
        })
    }

    /// Signal removal to every watcher, then forget the account and its calendars.
    pub fn remove_account(&mut self, account_id: &str) -> CalSyncResult<Vec<CalendarRecord>> {
        let entry = self
            .accounts
            .remove(account_id)
            .ok_or_else(|| CalSyncError::AccountNotFound(account_id.to_string()))?;

        entry.removal.send_replace(true);

        let ids: Vec<String> = self
            .calendars_for(account_id)
            .into_iter()
            .map(|c| c.id.clone())
            .collect();
        let removed: Vec<CalendarRecord> = ids
            .iter()
            .filter_map(|id| self.calendars.remove(id))
            .collect();

        info!(account_id, calendars = removed.len(), "account removed");
        Ok(removed)
    }
}
