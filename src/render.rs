//! TUI rendering traits for calsync types.
//!
//! Extension traits that add colored terminal rendering to calsync-core
//! types using owo_colors.

use calsync_core::pull::{AbortReason, CommitOutcome, CommitSummary};
use calsync_core::records::CalendarRecord;
use calsync_core::store::StoreCounts;
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for CalendarRecord {
    fn render(&self) -> String {
        if self.name == self.id {
            format!("📅 {}", self.name)
        } else {
            format!("📅 {} {}", self.name, format!("({})", self.id).dimmed())
        }
    }
}

/// Simple pluralization helper
fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

fn count_line(count: usize, word: &str) -> String {
    format!("{} {}", count, pluralize(word, count))
}

impl Render for CommitSummary {
    fn render(&self) -> String {
        let mut lines = Vec::new();

        let written = [
            (self.events, "event"),
            (self.ical_components, "component"),
            (self.busytimes, "busytime"),
            (self.alarms, "alarm"),
        ];
        for (count, word) in written {
            if count > 0 {
                lines.push(format!("   {} {}", "+".green(), count_line(count, word).green()));
            }
        }

        if self.removed_events > 0 {
            let label = count_line(self.removed_events, "event");
            lines.push(format!("   {} {}", "-".red(), label.red()));
        }

        if lines.is_empty() {
            return "   No changes".dimmed().to_string();
        }

        lines.join("\n")
    }
}

impl Render for AbortReason {
    fn render(&self) -> String {
        match self {
            AbortReason::AccountRemoved => "account was removed".yellow().to_string(),
            AbortReason::StoreWrite(e) => format!("store write failed: {}", e).red().to_string(),
        }
    }
}

impl Render for CommitOutcome {
    fn render(&self) -> String {
        match self {
            CommitOutcome::Committed(summary) => summary.render(),
            CommitOutcome::Aborted(reason) => {
                format!("   {} {}", "Sync aborted:".red(), reason.render())
            }
        }
    }
}

impl Render for StoreCounts {
    fn render(&self) -> String {
        let parts = [
            count_line(self.events, "event"),
            count_line(self.ical_components, "component"),
            count_line(self.busytimes, "busytime"),
            count_line(self.alarms, "alarm"),
        ];
        format!("   {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize() {
        assert_eq!(count_line(1, "event"), "1 event");
        assert_eq!(count_line(0, "alarm"), "0 alarms");
        assert_eq!(count_line(3, "busytime"), "3 busytimes");
    }

    #[test]
    fn test_empty_summary_renders_no_changes() {
        let rendered = CommitSummary::default().render();
        assert!(rendered.contains("No changes"));
    }

    #[test]
    fn test_summary_lists_written_and_removed() {
        let summary = CommitSummary {
            events: 2,
            removed_events: 1,
            ..CommitSummary::default()
        };
        let rendered = summary.render();
        assert!(rendered.contains("2 events"));
        assert!(rendered.contains("1 event"));
        assert!(!rendered.contains("busytime"));
    }
}
