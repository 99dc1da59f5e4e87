//! Change feed and live subscriptions.
//!
//! Every committed write bumps the global revision and publishes a
//! [`ChangeEvent`] naming the collections it touched. A [`Subscription`] turns
//! that stream into full result-set snapshots: it reloads its query from
//! scratch whenever a relevant event arrives, never applying diffs.

mod slot;

pub use slot::ViewSlot;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::errors::AppError;

/// Buffered events per receiver before it is reported as lagged.
const EVENT_CAPACITY: usize = 256;

/// Collection touched by a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Lists,
    Items { list_id: String },
    Stores,
    History,
    AccessList,
}

impl Topic {
    pub fn items(list_id: &str) -> Self {
        Topic::Items {
            list_id: list_id.to_string(),
        }
    }
}

/// One committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub revision: i64,
    pub topics: Vec<Topic>,
}

impl ChangeEvent {
    pub fn touches(&self, topic: &Topic) -> bool {
        self.topics.iter().any(|t| t == topic)
    }
}

struct FeedInner {
    revision: watch::Sender<i64>,
    events: broadcast::Sender<ChangeEvent>,
}

/// Fan-out point for committed changes.
#[derive(Clone)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

impl ChangeFeed {
    pub fn new(initial_revision: i64) -> Self {
        let (revision, _) = watch::channel(initial_revision);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(FeedInner { revision, events }),
        }
    }

    /// Announce a committed revision. Older revisions never move the counter back.
    pub fn publish(&self, revision: i64, topics: Vec<Topic>) {
        self.inner.revision.send_if_modified(|current| {
            if revision > *current {
                *current = revision;
                true
            } else {
                false
            }
        });
        tracing::debug!(revision, ?topics, "change published");
        // No live subscribers is fine.
        let _ = self.inner.events.send(ChangeEvent { revision, topics });
    }

    pub fn current_revision(&self) -> i64 {
        *self.inner.revision.borrow()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until the revision exceeds `since`, or `timeout` elapses.
    ///
    /// Returns the revision current at wake-up.
    pub async fn wait_for_revision_after(&self, since: i64, timeout: Duration) -> i64 {
        let mut rx = self.inner.revision.subscribe();
        let revision = match tokio::time::timeout(timeout, rx.wait_for(|rev| *rev > since)).await {
            Ok(Ok(rev)) => *rev,
            _ => self.current_revision(),
        };
        revision
    }
}

/// A full result set tagged with the revision it was loaded at.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub revision: i64,
    pub data: T,
}

/// Cancellable live query.
///
/// A background task performs an initial load and reloads on every event
/// accepted by the filter. Dropping the handle cancels the task.
pub struct Subscription<T> {
    rx: watch::Receiver<Option<Snapshot<T>>>,
    task: JoinHandle<()>,
}

impl<T> Subscription<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn start<P, F, Fut>(feed: &ChangeFeed, filter: P, loader: F) -> Self
    where
        P: Fn(&ChangeEvent) -> bool + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AppError>> + Send + 'static,
    {
        // Subscribe before the first load so no commit slips between them.
        let mut events = feed.subscribe_events();
        let feed = feed.clone();
        let (tx, rx) = watch::channel(None);

        let task = tokio::spawn(async move {
            reload(&feed, &loader, &tx).await;
            loop {
                match events.recv().await {
                    Ok(event) if filter(&event) => reload(&feed, &loader, &tx).await,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "subscription lagged, reloading");
                        reload(&feed, &loader, &tx).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                if tx.is_closed() {
                    break;
                }
            }
        });

        Self { rx, task }
    }

    /// Most recent snapshot, if the initial load has finished.
    pub fn latest(&self) -> Option<Snapshot<T>> {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot not yet seen through this handle.
    #[cfg(test)]
    pub async fn next(&mut self) -> Option<Snapshot<T>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    /// Wait for a snapshot loaded at a revision greater than `revision`.
    pub async fn wait_for_revision_after(&mut self, revision: i64) -> Option<Snapshot<T>> {
        let snapshot = self
            .rx
            .wait_for(|s| s.as_ref().is_some_and(|s| s.revision > revision))
            .await
            .ok()?;
        snapshot.clone()
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn reload<T, F, Fut>(feed: &ChangeFeed, loader: &F, tx: &watch::Sender<Option<Snapshot<T>>>)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    // Read before loading: the data is at least as new as the tag.
    let revision = feed.current_revision();
    match loader().await {
        Ok(data) => {
            tx.send_replace(Some(Snapshot { revision, data }));
        }
        Err(e) => {
            tracing::warn!("Subscription reload failed, keeping last snapshot: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const WAIT: Duration = Duration::from_secs(2);

    fn counting_loader(
        counter: Arc<AtomicUsize>,
    ) -> impl Fn() -> std::future::Ready<Result<usize, AppError>> + Send + Sync + 'static {
        move || std::future::ready(Ok(counter.fetch_add(1, Ordering::SeqCst) + 1))
    }

    #[tokio::test]
    async fn test_initial_load_is_delivered() {
        let feed = ChangeFeed::new(3);
        let loads = Arc::new(AtomicUsize::new(0));
        let mut sub = Subscription::start(&feed, |_| true, counting_loader(loads.clone()));

        let first = tokio::time::timeout(WAIT, sub.next()).await.unwrap().unwrap();
        assert_eq!(first, Snapshot { revision: 3, data: 1 });
        assert!(sub.is_active());
    }

    #[tokio::test]
    async fn test_only_matching_events_trigger_reload() {
        let feed = ChangeFeed::new(0);
        let loads = Arc::new(AtomicUsize::new(0));
        let mut sub = Subscription::start(
            &feed,
            |event: &ChangeEvent| event.touches(&Topic::Stores),
            counting_loader(loads.clone()),
        );
        tokio::time::timeout(WAIT, sub.wait_for_revision_after(-1))
            .await
            .unwrap()
            .unwrap();

        feed.publish(1, vec![Topic::Lists]);
        feed.publish(2, vec![Topic::Stores]);

        let snapshot = tokio::time::timeout(WAIT, sub.wait_for_revision_after(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.revision, 2);
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_previous_snapshot() {
        let feed = ChangeFeed::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let loader_calls = calls.clone();
        let mut sub = Subscription::start(
            &feed,
            |_| true,
            move || {
                let n = loader_calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(if n == 0 {
                    Ok("first".to_string())
                } else {
                    Err(AppError::Backend("offline".to_string()))
                })
            },
        );
        tokio::time::timeout(WAIT, sub.next()).await.unwrap().unwrap();

        feed.publish(1, vec![Topic::History]);
        while calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        let latest = sub.latest().unwrap();
        assert_eq!(latest.data, "first");
        assert_eq!(latest.revision, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscription_follows_feed_across_worker_threads() {
        let feed = ChangeFeed::new(0);
        let loads = Arc::new(AtomicUsize::new(0));
        let mut sub = Subscription::start(
            &feed,
            |event: &ChangeEvent| event.touches(&Topic::History),
            counting_loader(loads.clone()),
        );

        let publisher = feed.clone();
        tokio::spawn(async move {
            for revision in 1..=3 {
                publisher.publish(revision, vec![Topic::History]);
            }
        })
        .await
        .unwrap();

        let snapshot = tokio::time::timeout(WAIT, sub.wait_for_revision_after(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.revision, 3);

        let waiter = feed.clone();
        let rev = tokio::spawn(async move {
            waiter.wait_for_revision_after(3, Duration::from_millis(20)).await
        })
        .await
        .unwrap();
        assert_eq!(rev, 3);
    }

    #[tokio::test]
    async fn test_publish_never_moves_revision_backwards() {
        let feed = ChangeFeed::new(5);
        feed.publish(4, vec![Topic::Lists]);
        assert_eq!(feed.current_revision(), 5);
        feed.publish(6, vec![Topic::Lists]);
        assert_eq!(feed.current_revision(), 6);
    }

    #[tokio::test]
    async fn test_wait_for_revision_times_out_with_current() {
        let feed = ChangeFeed::new(2);
        let rev = feed
            .wait_for_revision_after(2, Duration::from_millis(20))
            .await;
        assert_eq!(rev, 2);

        let waiter = feed.clone();
        let handle =
            tokio::spawn(async move { waiter.wait_for_revision_after(2, WAIT).await });
        tokio::task::yield_now().await;
        feed.publish(3, vec![Topic::Stores]);
        assert_eq!(handle.await.unwrap(), 3);
    }
}
