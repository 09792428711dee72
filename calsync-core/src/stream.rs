//! Ordered channel of remote change notifications.

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{CalSyncError, CalSyncResult};
use crate::remote::{RemoteComponent, RemoteEvent, RemoteOccurrence};

/// One notification announced while walking a remote calendar response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Notification {
    Event(RemoteEvent),
    Component(RemoteComponent),
    /// Remote ids that no longer exist on the server.
    MissingEvents(Vec<String>),
    Occurrence(RemoteOccurrence),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Event(_) => "event",
            Notification::Component(_) => "component",
            Notification::MissingEvents(_) => "missingEvents",
            Notification::Occurrence(_) => "occurrence",
        }
    }
}

/// Producer half of a change stream.
#[derive(Debug, Clone)]
pub struct NotificationSender {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationSender {
    pub fn send(&self, notification: Notification) -> CalSyncResult<()> {
        self.tx
            .send(notification)
            .map_err(|_| CalSyncError::StreamClosed)
    }
}

/// Consumer half of a change stream. Yields notifications in emission order.
#[derive(Debug)]
pub struct NotificationReceiver {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl NotificationReceiver {
    /// Next notification, or `None` once every sender is dropped and the queue is drained.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }
}

pub fn channel() -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationSender { tx }, NotificationReceiver { rx })
}

/// Parse a recorded stream stored as one JSON notification per line.
pub fn read_json_lines(reader: impl BufRead) -> CalSyncResult<Vec<Notification>> {
    let mut notifications = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let notification = serde_json::from_str(&line).map_err(|e| {
            CalSyncError::Serialization(format!("line {}: {}", index + 1, e))
        })?;
        notifications.push(notification);
    }

    Ok(notifications)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_preserves_order() {
        let (tx, mut rx) = channel();
        tx.send(Notification::MissingEvents(vec!["a".into()])).unwrap();
        tx.send(Notification::MissingEvents(vec!["b".into()])).unwrap();
        drop(tx);

        assert_eq!(
            rx.recv().await,
            Some(Notification::MissingEvents(vec!["a".into()]))
        );
        assert_eq!(
            rx.recv().await,
            Some(Notification::MissingEvents(vec!["b".into()]))
        );
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = channel();
        drop(rx);

        let result = tx.send(Notification::MissingEvents(vec![]));
        assert!(matches!(result, Err(CalSyncError::StreamClosed)));
    }

    #[test]
    fn test_read_json_lines() {
        let input = r#"{"type":"event","data":{"id":"uid-1","start":{"utc":0},"end":{"utc":1000}}}

{"type":"component","data":{"eventId":"uid-1","ical":"BEGIN:VCALENDAR","lastRecurrenceId":false}}
{"type":"missingEvents","data":["gone-1","gone-2"]}
{"type":"occurrence","data":{"eventId":"uid-1","recurrenceId":{"utc":0},"start":{"utc":0},"end":{"utc":1000}}}
"#;

        let notifications = read_json_lines(input.as_bytes()).unwrap();
        let kinds: Vec<_> = notifications.iter().map(Notification::kind).collect();
        assert_eq!(kinds, vec!["event", "component", "missingEvents", "occurrence"]);
    }

    #[test]
    fn test_read_json_lines_reports_line_number() {
        let input = "{\"type\":\"missingEvents\",\"data\":[]}\nnot json\n";

        match read_json_lines(input.as_bytes()) {
            Err(CalSyncError::Serialization(msg)) => assert!(msg.starts_with("line 2:")),
            other => panic!("Expected serialization error, got {:?}", other),
        }
    }
}
