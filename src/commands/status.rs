use anyhow::Result;
use calsync_core::store::Store;
use owo_colors::OwoColorize;

use crate::render::Render;

pub fn run(store: &Store, calendar_filter: Option<&str>) -> Result<()> {
    let mut calendars = store.calendars();

    if let Some(id) = calendar_filter {
        calendars.retain(|c| c.id == id);
        if calendars.is_empty() {
            let available: Vec<_> = store.calendars().into_iter().map(|c| c.id).collect();
            anyhow::bail!(
                "Calendar '{}' not found. Available: {}",
                id,
                available.join(", ")
            );
        }
    }

    if calendars.is_empty() {
        println!(
            "No calendars yet.\n\n\
            Register one with:\n  \
            calsync account add <account>\n  \
            calsync calendar add <account> <calendar>"
        );
        return Ok(());
    }

    for (i, cal) in calendars.iter().enumerate() {
        println!("{}", cal.render());
        println!("{}", store.counts(Some(&cal.id)).render());

        match cal.last_event_sync_date {
            Some(date) => println!(
                "   {}",
                format!("Last synced {}", date.format("%Y-%m-%d %H:%M UTC")).dimmed()
            ),
            None => println!("   {}", "Never synced".dimmed()),
        }

        if let Some(error) = &cal.error {
            println!("   {}", error.red());
        }

        // Add spacing between calendars (but not after the last one)
        if i < calendars.len() - 1 {
            println!();
        }
    }

    Ok(())
}
