use crate::Changes;
use futures::Stream;
use std::{
    collections::BTreeSet,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    task::{Context, Poll},
};
use tokio::sync::mpsc;

struct Subscriber {
    id: u64,
    tables: BTreeSet<String>,
    tags: BTreeSet<String>,
    sink: mpsc::UnboundedSender<Changes>,
}

/// In-process publish/subscribe broker for [`Changes`].
///
/// One instance per storage handle, owned by it and passed by reference;
/// tests can instantiate isolated buses. There is no buffering or
/// replay: a subscriber that starts after a publish never sees it.
///
/// Fan-out is synchronous and in publish order per subscriber. Sinks are
/// unbounded channels, so sending never blocks the publisher and runs no
/// subscriber code; holding the registry lock across the fan-out is what
/// keeps iteration safe against concurrent subscribe/unsubscribe.
pub struct ChangeBus {
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(1),
        }
    }

    /// Deliver `changes` to every subscription whose interest set
    /// overlaps it (tables OR tags). Subscriptions whose receiving end
    /// was dropped are pruned along the way.
    pub fn publish(&self, changes: &Changes) {
        log::trace!("publishing changes {changes}");
        let mut subscribers = self.subscribers.lock().expect("change bus lock poisoned");
        subscribers.retain(|subscriber| {
            if !changes.intersects(&subscriber.tables, &subscriber.tags) {
                return !subscriber.sink.is_closed();
            }
            subscriber.sink.send(changes.clone()).is_ok()
        });
    }

    /// Subscribe to changes matching the given interest sets. The
    /// returned stream is infinite and unsubscribes on drop; with both
    /// sets empty it never yields.
    pub fn subscribe(&self, tables: BTreeSet<String>, tags: BTreeSet<String>) -> ChangesStream {
        let (sink, source) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .expect("change bus lock poisoned")
            .push(Subscriber {
                id,
                tables,
                tags,
                sink,
            });
        ChangesStream {
            source,
            id,
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("change bus lock poisoned").len()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Infinite stream of matching [`Changes`]; dropping it removes the
/// subscription. Events already fanned out are unaffected by the drop
/// but are discarded with the stream.
pub struct ChangesStream {
    source: mpsc::UnboundedReceiver<Changes>,
    id: u64,
    subscribers: Arc<Mutex<Vec<Subscriber>>>,
}

impl Stream for ChangesStream {
    type Item = Changes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.source.poll_recv(cx)
    }
}

impl Drop for ChangesStream {
    fn drop(&mut self) {
        self.subscribers
            .lock()
            .expect("change bus lock poisoned")
            .retain(|subscriber| subscriber.id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::{collections::BTreeSet, time::Duration};

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    async fn assert_idle(stream: &mut ChangesStream) {
        let next = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
        assert!(next.is_err(), "stream should not have yielded");
    }

    #[tokio::test]
    async fn delivers_on_table_overlap_only() {
        let bus = ChangeBus::new();
        let mut users = bus.subscribe(set(&["users"]), set(&[]));

        bus.publish(&Changes::new(["users", "cars"], [] as [&str; 0]).unwrap());
        bus.publish(&Changes::table("cars"));

        let received = users.next().await.unwrap();
        assert!(received.tables().contains("users"));
        assert_idle(&mut users).await;
    }

    #[tokio::test]
    async fn delivers_on_tag_overlap() {
        let bus = ChangeBus::new();
        let mut sync = bus.subscribe(set(&[]), set(&["sync"]));

        bus.publish(&Changes::tag("sync"));
        assert_eq!(sync.next().await.unwrap(), Changes::tag("sync"));
    }

    #[tokio::test]
    async fn empty_interest_never_fires() {
        let bus = ChangeBus::new();
        let mut nothing = bus.subscribe(set(&[]), set(&[]));

        bus.publish(&Changes::table("users"));
        bus.publish(&Changes::tag("sync"));
        assert_idle(&mut nothing).await;
    }

    #[tokio::test]
    async fn no_replay_for_late_subscribers() {
        let bus = ChangeBus::new();
        bus.publish(&Changes::table("users"));

        let mut late = bus.subscribe(set(&["users"]), set(&[]));
        assert_idle(&mut late).await;

        bus.publish(&Changes::table("users"));
        assert_eq!(late.next().await.unwrap(), Changes::table("users"));
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let bus = ChangeBus::new();
        let stream = bus.subscribe(set(&["users"]), set(&[]));
        assert_eq!(bus.subscriber_count(), 1);
        drop(stream);
        assert_eq!(bus.subscriber_count(), 0);
        // publishing to nobody is fine
        bus.publish(&Changes::table("users"));
    }

    #[tokio::test]
    async fn events_arrive_in_publish_order() {
        let bus = ChangeBus::new();
        let mut stream = bus.subscribe(set(&["a", "b", "c"]), set(&[]));
        bus.publish(&Changes::table("a"));
        bus.publish(&Changes::table("b"));
        bus.publish(&Changes::table("c"));
        assert_eq!(stream.next().await.unwrap(), Changes::table("a"));
        assert_eq!(stream.next().await.unwrap(), Changes::table("b"));
        assert_eq!(stream.next().await.unwrap(), Changes::table("c"));
    }

    #[tokio::test]
    async fn concurrent_subscribe_and_publish() {
        let bus = Arc::new(ChangeBus::new());
        let publisher = {
            let bus = Arc::clone(&bus);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    bus.publish(&Changes::table("users"));
                }
            })
        };
        for _ in 0..50 {
            let stream = bus.subscribe(set(&["users"]), set(&[]));
            drop(stream);
        }
        publisher.join().unwrap();
    }
}
