use anyhow::Result;
use calsync_core::records::Account;
use calsync_core::registry::AccountRegistry;
use calsync_core::store::Store;
use owo_colors::OwoColorize;

use crate::render::Render;

pub fn add(store: &Store, id: String, provider: Option<String>, user: Option<String>) -> Result<()> {
    if store.account(&id).is_some() {
        anyhow::bail!("Account '{}' already exists", id);
    }

    let mut tx = store.transaction();
    tx.put_account(Account {
        id: id.clone(),
        provider,
        user,
    });
    tx.commit()?;

    println!("{} account {}", "Added".green(), id);
    Ok(())
}

pub fn remove(store: &Store, id: &str) -> Result<()> {
    // Removal is signalled before the cascade is written.
    let mut registry = AccountRegistry::load(store);
    let calendars = registry.remove_account(id)?;

    let mut tx = store.transaction();
    tx.remove_account(id);
    let summary = tx.commit()?;

    println!("{} account {}", "Removed".red(), id);
    for calendar in &calendars {
        println!("   {}", calendar.render().dimmed());
    }
    if summary.removed_events > 0 {
        println!("   {} events deleted", summary.removed_events);
    }

    Ok(())
}
