use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use calsync_core::cache::UiCache;
use calsync_core::config::CalSyncConfig;
use calsync_core::ics::{CalDavResource, IcsStream};
use calsync_core::pull::PullSession;
use calsync_core::records::{LocalBusytime, LocalEvent};
use calsync_core::registry::AccountRegistry;
use calsync_core::store::Store;
use calsync_core::stream::{self, Notification};
use chrono::Utc;
use indicatif::ProgressBar;
use owo_colors::OwoColorize;
use tracing::debug;

use crate::render::Render;
use crate::utils::tui::create_spinner;

/// Where the notifications for a pull come from.
pub enum Source {
    /// A recorded stream, one JSON notification per line.
    JsonLines(PathBuf),
    /// A single CalDAV resource.
    Ics {
        path: PathBuf,
        url: Option<String>,
        etag: Option<String>,
    },
}

/// Keeps the spinner message in step with records as they are queued.
struct SpinnerCache {
    spinner: ProgressBar,
    label: String,
    events: AtomicUsize,
    busytimes: AtomicUsize,
}

impl SpinnerCache {
    fn update(&self) {
        self.spinner.set_message(format!(
            "{} {} events, {} busytimes",
            self.label,
            self.events.load(Ordering::Relaxed),
            self.busytimes.load(Ordering::Relaxed)
        ));
    }
}

impl UiCache for SpinnerCache {
    fn cache_event(&self, _event: &LocalEvent) {
        self.events.fetch_add(1, Ordering::Relaxed);
        self.update();
    }

    fn cache_busytime(&self, _busytime: &LocalBusytime) {
        self.busytimes.fetch_add(1, Ordering::Relaxed);
        self.update();
    }
}

pub async fn run(
    store: &Store,
    config: &CalSyncConfig,
    calendar_id: &str,
    source: Source,
    sync_token: Option<String>,
) -> Result<()> {
    let registry = AccountRegistry::load(store);

    let mut calendar = registry.calendar(calendar_id)?.clone();
    if sync_token.is_some() {
        calendar.remote_sync_token = sync_token;
    }
    let account = registry.account(&calendar.account_id)?.clone();
    let removal = registry.watch_removal(&account.id)?;

    let notifications = read_source(source, config)?;

    let spinner = create_spinner(calendar.render());
    let cache = Arc::new(SpinnerCache {
        spinner: spinner.clone(),
        label: calendar.render(),
        events: AtomicUsize::new(0),
        busytimes: AtomicUsize::new(0),
    });

    let mut session = PullSession::new(store.clone(), calendar.clone(), account, removal)?
        .with_cache(cache);

    let (tx, rx) = stream::channel();
    let producer = tokio::spawn(async move {
        for notification in notifications {
            tx.send(notification)?;
        }
        Ok::<_, calsync_core::CalSyncError>(())
    });

    let handled = session.consume(rx).await;
    producer.await??;
    debug!(calendar_id, handled, "stream consumed");

    let outcome = session.commit().await?;
    spinner.finish_and_clear();

    println!("{}", calendar.render());
    println!("{}", outcome.render());

    if !outcome.is_committed() {
        anyhow::bail!("Nothing was written for calendar '{}'", calendar.id);
    }

    println!("\n{} {} notifications", "Pulled".green(), handled);
    Ok(())
}

fn read_source(source: Source, config: &CalSyncConfig) -> Result<Vec<Notification>> {
    match source {
        Source::JsonLines(path) => {
            let file = File::open(&path)
                .with_context(|| format!("Could not open {}", path.display()))?;
            Ok(stream::read_json_lines(BufReader::new(file))?)
        }
        Source::Ics { path, url, etag } => {
            let ical = std::fs::read_to_string(&path)
                .with_context(|| format!("Could not read {}", path.display()))?;
            let resource = CalDavResource { url, etag, ical };
            let producer = IcsStream::new(config.expansion.clone());
            Ok(producer.notifications(&resource, Utc::now())?)
        }
    }
}
