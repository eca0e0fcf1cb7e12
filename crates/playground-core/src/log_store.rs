//! Broadcast + history log store backing the visible log panel.

use std::{
    collections::VecDeque,
    sync::{PoisonError, RwLock},
    time::SystemTime,
};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::{ConsoleMessage, LogChannel, LogEvent};

/// Default history size limit (16 MB).
pub const DEFAULT_HISTORY_BYTES: usize = 16 * 1024 * 1024;

/// Change to the log history, as seen by live listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum LogUpdate {
    /// An event was appended.
    Appended(LogEvent),
    /// The history was truncated by `console.clear` with sequence `seq`.
    Cleared { seq: u64 },
}

impl LogUpdate {
    /// Host-side sequence number of the update.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        match self {
            Self::Appended(event) => event.seq,
            Self::Cleared { seq } => *seq,
        }
    }
}

#[derive(Clone)]
struct StoredEvent {
    event: LogEvent,
    bytes: usize,
}

struct Inner {
    history: VecDeque<StoredEvent>,
    total_bytes: usize,
    next_seq: u64,
}

/// Append-only log history with a live broadcast feed.
///
/// New listeners receive the history first and then switch to live updates,
/// so a reconnecting log panel converges on the same view.
pub struct LogStore {
    inner: RwLock<Inner>,
    sender: broadcast::Sender<LogUpdate>,
    max_bytes: usize,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    /// Create a store with the default history limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_BYTES)
    }

    /// Create a store that drops the oldest events beyond `max_bytes`.
    #[must_use]
    pub fn with_limit(max_bytes: usize) -> Self {
        let (sender, _) = broadcast::channel(10_000);
        Self {
            inner: RwLock::new(Inner {
                history: VecDeque::with_capacity(32),
                total_bytes: 0,
                next_seq: 0,
            }),
            sender,
            max_bytes,
        }
    }

    /// Stamp a console message with its receipt time and apply store semantics.
    ///
    /// `clear` truncates the history; every other channel appends.
    pub fn record(&self, msg: &ConsoleMessage) -> LogEvent {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let event = LogEvent::from_console(msg, inner.next_seq, SystemTime::now());
        inner.next_seq += 1;

        if event.channel == LogChannel::Clear {
            inner.history.clear();
            inner.total_bytes = 0;
            drop(inner);
            let _ = self.sender.send(LogUpdate::Cleared { seq: event.seq });
            return event;
        }

        let bytes = event.approx_bytes();
        while inner.total_bytes.saturating_add(bytes) > self.max_bytes {
            if let Some(front) = inner.history.pop_front() {
                inner.total_bytes = inner.total_bytes.saturating_sub(front.bytes);
            } else {
                break;
            }
        }
        inner.history.push_back(StoredEvent {
            event: event.clone(),
            bytes,
        });
        inner.total_bytes = inner.total_bytes.saturating_add(bytes);
        drop(inner);

        let _ = self.sender.send(LogUpdate::Appended(event.clone())); // live listeners
        event
    }

    /// Get a receiver for live updates.
    #[must_use]
    pub fn get_receiver(&self) -> broadcast::Receiver<LogUpdate> {
        self.sender.subscribe()
    }

    /// Get a snapshot of the history.
    #[must_use]
    pub fn get_history(&self) -> Vec<LogEvent> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .iter()
            .map(|s| s.event.clone())
            .collect()
    }

    /// Number of events in the history.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .len()
    }

    /// Whether the history is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stream that yields the history first, then live updates.
    #[must_use]
    pub fn history_plus_stream(&self) -> futures::stream::BoxStream<'static, LogUpdate> {
        // Subscribe before snapshotting so nothing falls between the two.
        let rx = self.get_receiver();
        let (history, next_seq) = {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            let history: Vec<LogEvent> = inner.history.iter().map(|s| s.event.clone()).collect();
            (history, inner.next_seq)
        };
        replay(history, next_seq, rx)
    }
}

/// The history, then every live update recorded at or after `next_seq`.
/// Updates already reflected in the history (appends and clears alike) are
/// skipped.
fn replay(
    history: Vec<LogEvent>,
    next_seq: u64,
    rx: broadcast::Receiver<LogUpdate>,
) -> futures::stream::BoxStream<'static, LogUpdate> {
    let hist = futures::stream::iter(history.into_iter().map(LogUpdate::Appended));
    let live = BroadcastStream::new(rx).filter_map(move |res| async move {
        match res {
            Ok(update) if update.seq() < next_seq => None,
            Ok(update) => Some(update),
            Err(e) => {
                tracing::debug!("log listener lagged: {e}");
                None
            }
        }
    });

    Box::pin(hist.chain(live))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn log(text: &str) -> ConsoleMessage {
        ConsoleMessage::new(LogChannel::Log, &[json!(text)])
    }

    #[test]
    fn appends_in_order() {
        let store = LogStore::new();
        store.record(&log("a"));
        store.record(&ConsoleMessage::error("b"));

        let history = store.get_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].channel, LogChannel::Log);
        assert_eq!(history[1].channel, LogChannel::Error);
        assert!(history[0].seq < history[1].seq);
    }

    #[test]
    fn clear_truncates_history() {
        let store = LogStore::new();
        store.record(&log("before"));
        store.record(&log("also before"));
        store.record(&ConsoleMessage::Clear);
        assert!(store.is_empty());

        store.record(&log("after"));
        let history = store.get_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].payload, Some(vec![json!("after")]));
    }

    #[test]
    fn oldest_events_dropped_past_limit() {
        let store = LogStore::with_limit(200);
        for i in 0..20 {
            store.record(&log(&format!("line {i}")));
        }
        let history = store.get_history();
        assert!(history.len() < 20);
        assert_eq!(
            history.last().and_then(|e| e.payload.clone()),
            Some(vec![json!("line 19")])
        );
    }

    #[tokio::test]
    async fn receiver_sees_clear() {
        let store = LogStore::new();
        let mut rx = store.get_receiver();
        store.record(&log("x"));
        store.record(&ConsoleMessage::Clear);

        assert!(matches!(rx.recv().await.unwrap(), LogUpdate::Appended(_)));
        assert_eq!(rx.recv().await.unwrap(), LogUpdate::Cleared { seq: 1 });
    }

    #[tokio::test]
    async fn history_then_live() {
        let store = LogStore::new();
        store.record(&log("old"));

        let mut stream = store.history_plus_stream();
        store.record(&log("new"));

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        let LogUpdate::Appended(first) = first else {
            panic!("expected history event");
        };
        let LogUpdate::Appended(second) = second else {
            panic!("expected live event");
        };
        assert_eq!(first.payload, Some(vec![json!("old")]));
        assert_eq!(second.payload, Some(vec![json!("new")]));
    }

    #[test]
    fn stream_waits_for_live_events() {
        let store = LogStore::new();
        let mut stream = store.history_plus_stream();

        let mut next = tokio_test::task::spawn(stream.next());
        tokio_test::assert_pending!(next.poll());

        store.record(&log("live"));
        assert!(next.is_woken());
        let update = tokio_test::assert_ready!(next.poll());
        assert!(matches!(update, Some(LogUpdate::Appended(e)) if e.payload == Some(vec![json!("live")])));
    }

    fn view_of(stream: &mut futures::stream::BoxStream<'static, LogUpdate>) -> Vec<LogEvent> {
        use futures::FutureExt;

        let mut view = Vec::new();
        while let Some(Some(update)) = stream.next().now_or_never() {
            match update {
                LogUpdate::Appended(event) => view.push(event),
                LogUpdate::Cleared { .. } => view.clear(),
            }
        }
        view
    }

    #[test]
    fn late_subscriber_converges_across_clear() {
        let store = LogStore::new();
        store.record(&log("a"));

        // Subscribed before the clear, snapshotted after the next append.
        let rx = store.get_receiver();
        store.record(&ConsoleMessage::Clear);
        store.record(&log("b"));
        let history = store.get_history();
        let next_seq = store.inner.read().unwrap().next_seq;

        let mut stream = replay(history, next_seq, rx);
        assert_eq!(view_of(&mut stream), store.get_history());

        store.record(&log("c"));
        let mut stream = store.history_plus_stream();
        store.record(&ConsoleMessage::Clear);
        store.record(&log("d"));
        assert_eq!(view_of(&mut stream), store.get_history());
        assert_eq!(store.len(), 1);
    }
}
