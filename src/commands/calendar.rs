use anyhow::Result;
use calsync_core::records::CalendarRecord;
use calsync_core::registry::AccountRegistry;
use calsync_core::store::Store;
use owo_colors::OwoColorize;

use crate::render::Render;

pub fn add(store: &Store, account_id: &str, id: String, name: Option<String>) -> Result<()> {
    if store.calendar(&id).is_some() {
        anyhow::bail!("Calendar '{}' already exists", id);
    }

    let name = name.unwrap_or_else(|| id.clone());
    let calendar = CalendarRecord::new(id, account_id, name);

    // Rejects calendars for unknown accounts.
    let mut registry = AccountRegistry::load(store);
    registry.register_calendar(calendar.clone())?;

    let mut tx = store.transaction();
    tx.put_calendar(calendar.clone());
    tx.commit()?;

    println!("{} {}", "Added".green(), calendar.render());
    Ok(())
}
