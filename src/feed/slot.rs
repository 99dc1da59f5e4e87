//! One-live-subscription-per-view holder.

use super::Subscription;

/// Owns at most one subscription for a view.
///
/// Replacing cancels the previous subscription before the new one starts.
pub struct ViewSlot<T> {
    view: &'static str,
    current: Option<(String, Subscription<T>)>,
}

impl<T> ViewSlot<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(view: &'static str) -> Self {
        Self {
            view,
            current: None,
        }
    }

    /// Cancel the current subscription, then start a new one keyed by `key`.
    pub fn replace<F>(&mut self, key: impl Into<String>, start: F) -> &mut Subscription<T>
    where
        F: FnOnce() -> Subscription<T>,
    {
        self.cancel();
        let key = key.into();
        tracing::debug!(view = self.view, key = %key, "subscription started");
        let (_, subscription) = self.current.insert((key, start()));
        subscription
    }

    pub fn cancel(&mut self) {
        if let Some((key, subscription)) = self.current.take() {
            tracing::debug!(view = self.view, key = %key, "subscription cancelled");
            subscription.cancel();
        }
    }

    /// Key of the live subscription, e.g. the open list id.
    #[cfg(test)]
    pub fn key(&self) -> Option<&str> {
        self.current.as_ref().map(|(key, _)| key.as_str())
    }

    pub fn get(&self) -> Option<&Subscription<T>> {
        self.current.as_ref().map(|(_, sub)| sub)
    }

    pub fn get_mut(&mut self) -> Option<&mut Subscription<T>> {
        self.current.as_mut().map(|(_, sub)| sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use crate::feed::{ChangeFeed, Topic};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn start_counting(feed: &ChangeFeed, loads: Arc<AtomicUsize>) -> Subscription<usize> {
        Subscription::start(feed, |_| true, move || {
            let n = loads.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<usize, AppError>(n) }
        })
    }

    #[tokio::test]
    async fn test_replace_cancels_previous_subscription() {
        let feed = ChangeFeed::new(0);
        let first_loads = Arc::new(AtomicUsize::new(0));
        let second_loads = Arc::new(AtomicUsize::new(0));
        let mut slot = ViewSlot::new("list-items");

        let first = slot.replace("list-a", || start_counting(&feed, first_loads.clone()));
        tokio::time::timeout(Duration::from_secs(2), first.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(slot.key(), Some("list-a"));

        let second = slot.replace("list-b", || start_counting(&feed, second_loads.clone()));
        tokio::time::timeout(Duration::from_secs(2), second.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(slot.key(), Some("list-b"));

        feed.publish(1, vec![Topic::Lists]);
        let second = slot.get_mut().unwrap();
        tokio::time::timeout(Duration::from_secs(2), second.wait_for_revision_after(0))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first_loads.load(Ordering::SeqCst), 1);
        assert_eq!(second_loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_empties_slot() {
        let feed = ChangeFeed::new(0);
        let mut slot = ViewSlot::new("store-detail");
        slot.replace("store-1", || start_counting(&feed, Arc::new(AtomicUsize::new(0))));
        assert!(slot.get().is_some());

        slot.cancel();
        assert!(slot.get().is_none());
        assert_eq!(slot.key(), None);
    }
}
