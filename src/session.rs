//! Per-user application state controller.
//!
//! A [`Session`] is what a connected client holds: the signed-in user, a live
//! cached snapshot of every store layout, and at most one live view of an open
//! list. Each navigation step is an explicit transition; opening a list cancels
//! the subscription of the list shown before it.

use std::sync::Arc;

use crate::db::Repository;
use crate::errors::AppError;
use crate::feed::{ChangeEvent, Snapshot, Subscription, Topic, ViewSlot};
use crate::models::{Identity, Item, ShoppingList, Store};
use crate::ordering::{render, RenderedList};

/// An open list together with its items.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot {
    pub list: ShoppingList,
    pub items: Vec<Item>,
}

pub struct Session {
    repo: Arc<Repository>,
    user: Identity,
    stores: Subscription<Vec<Store>>,
    active_list: ViewSlot<ListSnapshot>,
    active_store_id: Option<String>,
    search: String,
}

impl Session {
    /// Start a session for `uid`. Users missing from the allow-list are refused.
    pub async fn start(repo: Arc<Repository>, uid: &str) -> Result<Self, AppError> {
        if !repo.is_allowed(uid).await? {
            tracing::warn!(uid, "session refused: not on allow-list");
            return Err(AppError::Forbidden(format!("User {} is not allowed", uid)));
        }

        let loader_repo = repo.clone();
        let stores = Subscription::start(
            repo.feed(),
            |event: &ChangeEvent| event.touches(&Topic::Stores),
            move || {
                let repo = loader_repo.clone();
                async move { repo.list_stores().await }
            },
        );

        tracing::info!(uid, "session started");
        Ok(Self {
            repo,
            user: Identity {
                uid: uid.to_string(),
            },
            stores,
            active_list: ViewSlot::new("list"),
            active_store_id: None,
            search: String::new(),
        })
    }

    pub fn user(&self) -> &Identity {
        &self.user
    }

    /// Cached store layouts; empty until the first load lands.
    pub fn stores(&self) -> Vec<Store> {
        self.stores
            .latest()
            .map(|snapshot| snapshot.data)
            .unwrap_or_default()
    }

    /// Wait until the store cache reflects a revision newer than `revision`.
    pub async fn wait_for_stores_after(&mut self, revision: i64) -> Option<Vec<Store>> {
        self.stores
            .wait_for_revision_after(revision)
            .await
            .map(|snapshot| snapshot.data)
    }

    /// Show a list. The search filter is reset.
    pub async fn open_list(&mut self, list_id: &str) -> Result<(), AppError> {
        if self.repo.get_list(list_id).await?.is_none() {
            return Err(AppError::NotFound(format!("List {} not found", list_id)));
        }

        let repo = self.repo.clone();
        let feed = repo.feed().clone();
        let items_topic = Topic::items(list_id);
        let id = list_id.to_string();
        self.active_list.replace(list_id, move || {
            Subscription::start(
                &feed,
                move |event: &ChangeEvent| {
                    event.touches(&items_topic) || event.touches(&Topic::Lists)
                },
                move || {
                    let repo = repo.clone();
                    let id = id.clone();
                    async move { load_list(&repo, &id).await }
                },
            )
        });
        self.search.clear();
        Ok(())
    }

    pub fn close_list(&mut self) {
        self.active_list.cancel();
        self.search.clear();
    }

    /// Id of the open list, if any.
    #[cfg(test)]
    pub fn active_list_id(&self) -> Option<&str> {
        self.active_list.key()
    }

    /// Latest snapshot of the open list.
    #[cfg(test)]
    pub fn active_list(&self) -> Option<ListSnapshot> {
        self.active_list
            .get()
            .and_then(Subscription::latest)
            .map(|snapshot| snapshot.data)
    }

    /// Wait until the open list reflects a revision newer than `revision`.
    #[cfg(test)]
    pub async fn wait_for_list_after(&mut self, revision: i64) -> Option<Snapshot<ListSnapshot>> {
        self.active_list
            .get_mut()?
            .wait_for_revision_after(revision)
            .await
    }

    /// Revision the cached store list was loaded at.
    pub fn stores_revision(&self) -> Option<i64> {
        self.stores.latest().map(|snapshot| snapshot.revision)
    }

    /// Select a store for section editing.
    pub async fn open_store(&mut self, store_id: &str) -> Result<Store, AppError> {
        let store = match self.stores().into_iter().find(|s| s.id == store_id) {
            Some(store) => store,
            None => self
                .repo
                .get_store(store_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Store {} not found", store_id)))?,
        };
        self.active_store_id = Some(store.id.clone());
        Ok(store)
    }

    pub fn close_store(&mut self) {
        self.active_store_id = None;
    }

    /// The selected store from the cache. `None` once it has been deleted.
    pub fn active_store(&self) -> Option<Store> {
        let id = self.active_store_id.as_deref()?;
        self.stores().into_iter().find(|s| s.id == id)
    }

    pub fn set_search(&mut self, query: &str) {
        self.search = query.to_string();
    }

    #[cfg(test)]
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Render the open list against the cached store layouts.
    ///
    /// `None` while no list is open or a first load is still pending.
    #[cfg(test)]
    pub fn render_active(&self) -> Option<RenderedList> {
        self.active_view().map(|snapshot| snapshot.data)
    }

    /// Rendered open list, tagged with the newer of the list and store revisions.
    pub fn active_view(&self) -> Option<Snapshot<RenderedList>> {
        let list = self.active_list.get()?.latest()?;
        let stores = self.stores.latest()?;
        let store = list
            .data
            .list
            .store_id
            .as_deref()
            .and_then(|id| stores.data.iter().find(|s| s.id == id));

        Some(Snapshot {
            revision: list.revision.max(stores.revision),
            data: render(&list.data.items, store, Some(&self.search)),
        })
    }

    /// Wait for a rendered view of the open list newer than `revision`.
    ///
    /// Changes to the list, its items or any store layout all count. Returns at
    /// once when the current view is already newer.
    pub async fn watch_active(&mut self, revision: i64) -> Option<Snapshot<RenderedList>> {
        self.stores.wait_for_revision_after(-1).await?;
        self.active_list
            .get_mut()?
            .wait_for_revision_after(-1)
            .await?;

        if self.active_view()?.revision <= revision {
            let list = self.active_list.get_mut()?;
            tokio::select! {
                changed = list.wait_for_revision_after(revision) => { changed?; }
                changed = self.stores.wait_for_revision_after(revision) => { changed?; }
            }
        }
        self.active_view()
    }
}

async fn load_list(repo: &Repository, list_id: &str) -> Result<ListSnapshot, AppError> {
    let list = repo
        .get_list(list_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("List {} not found", list_id)))?;
    let items = repo.list_items(list_id).await?;
    Ok(ListSnapshot { list, items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use crate::models::{CreateListRequest, CreateStoreRequest, QuickAddRequest};
    use std::time::Duration;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    async fn setup() -> (TempDir, Arc<Repository>) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = Arc::new(Repository::new(pool).await.unwrap());
        repo.seed_allowed_users(&["alice".to_string()]).await.unwrap();
        (temp_dir, repo)
    }

    #[tokio::test]
    async fn test_start_refuses_unknown_user() {
        let (_dir, repo) = setup().await;
        let err = Session::start(repo, "mallory").await.err().unwrap();
        assert_eq!(err.error_code(), "ACCESS_DENIED");
    }

    #[tokio::test]
    async fn test_render_active_uses_cached_store_and_search() {
        let (_dir, repo) = setup().await;
        let store = repo
            .create_store(&CreateStoreRequest {
                name: "Mart".to_string(),
                sections: vec!["Produce".to_string(), "Dairy".to_string()],
            })
            .await
            .unwrap();
        let list = repo
            .create_list(&CreateListRequest {
                name: "Weekly".to_string(),
                store_id: Some(store.id.clone()),
            })
            .await
            .unwrap();
        repo.quick_add(
            &list.id,
            &QuickAddRequest {
                text: "Milk".to_string(),
                section: Some("dairy".to_string()),
            },
        )
        .await
        .unwrap();
        repo.quick_add(
            &list.id,
            &QuickAddRequest {
                text: "Apples, Bananas".to_string(),
                section: Some("Produce".to_string()),
            },
        )
        .await
        .unwrap();

        let mut session = Session::start(repo.clone(), "alice").await.unwrap();
        session.open_list(&list.id).await.unwrap();
        tokio::time::timeout(WAIT, session.wait_for_list_after(-1))
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(WAIT, session.wait_for_stores_after(-1))
            .await
            .unwrap()
            .unwrap();

        let rendered = session.render_active().unwrap();
        let labels: Vec<_> = rendered.groups.iter().map(|g| g.label.clone()).collect();
        assert_eq!(
            labels,
            vec![Some("Produce".to_string()), Some("Dairy".to_string())]
        );

        session.set_search("ban");
        let filtered = session.render_active().unwrap();
        assert_eq!(filtered.item_count(), 1);
        assert_eq!(filtered.groups[0].items[0].text, "Bananas");
    }

    #[tokio::test]
    async fn test_open_list_switches_view_and_follows_changes() {
        let (_dir, repo) = setup().await;
        let first = repo
            .create_list(&CreateListRequest {
                name: "First".to_string(),
                store_id: None,
            })
            .await
            .unwrap();
        let second = repo
            .create_list(&CreateListRequest {
                name: "Second".to_string(),
                store_id: None,
            })
            .await
            .unwrap();

        let mut session = Session::start(repo.clone(), "alice").await.unwrap();
        session.open_list(&first.id).await.unwrap();
        session.set_search("x");
        session.open_list(&second.id).await.unwrap();
        assert_eq!(session.active_list_id(), Some(second.id.as_str()));
        assert_eq!(session.search(), "");

        let before = repo.get_revision_id().await.unwrap();
        repo.quick_add(
            &second.id,
            &QuickAddRequest {
                text: "Tea".to_string(),
                section: None,
            },
        )
        .await
        .unwrap();

        let snapshot = tokio::time::timeout(WAIT, session.wait_for_list_after(before))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.data.list.id, second.id);
        assert_eq!(snapshot.data.items.len(), 1);

        session.close_list();
        assert!(session.active_list_id().is_none());
        assert!(session.render_active().is_none());
    }

    #[tokio::test]
    async fn test_watch_active_wakes_on_store_layout_change() {
        let (_dir, repo) = setup().await;
        let store = repo
            .create_store(&CreateStoreRequest {
                name: "Mart".to_string(),
                sections: vec!["Produce".to_string()],
            })
            .await
            .unwrap();
        let list = repo
            .create_list(&CreateListRequest {
                name: "Weekly".to_string(),
                store_id: Some(store.id.clone()),
            })
            .await
            .unwrap();
        repo.quick_add(
            &list.id,
            &QuickAddRequest {
                text: "Milk".to_string(),
                section: Some("Dairy".to_string()),
            },
        )
        .await
        .unwrap();

        let mut session = Session::start(repo.clone(), "alice").await.unwrap();
        session.open_list(&list.id).await.unwrap();
        let current = repo.get_revision_id().await.unwrap();

        let first = tokio::time::timeout(WAIT, session.watch_active(current - 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.revision, current);
        assert_eq!(first.data.groups[0].label.as_deref(), Some("Unsorted"));

        let watcher = tokio::spawn(async move {
            let view = session.watch_active(current).await;
            (session, view)
        });
        tokio::task::yield_now().await;
        repo.replace_sections(&store.id, vec!["Dairy".to_string()])
            .await
            .unwrap();

        let (_session, view) = tokio::time::timeout(WAIT, watcher)
            .await
            .unwrap()
            .unwrap();
        let view = view.unwrap();
        assert!(view.revision > current);
        assert_eq!(view.data.groups[0].label.as_deref(), Some("Dairy"));
    }

    #[tokio::test]
    async fn test_open_missing_list_and_store() {
        let (_dir, repo) = setup().await;
        let mut session = Session::start(repo, "alice").await.unwrap();

        let err = session.open_list("missing").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
        let err = session.open_store("missing").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(session.active_store().is_none());
    }

    #[tokio::test]
    async fn test_active_store_disappears_after_delete() {
        let (_dir, repo) = setup().await;
        let store = repo
            .create_store(&CreateStoreRequest {
                name: "Corner Shop".to_string(),
                sections: vec![],
            })
            .await
            .unwrap();

        let mut session = Session::start(repo.clone(), "alice").await.unwrap();
        assert_eq!(session.user().uid, "alice");
        session.open_store(&store.id).await.unwrap();

        let before = repo.get_revision_id().await.unwrap();
        repo.delete_store(&store.id).await.unwrap();
        tokio::time::timeout(WAIT, session.wait_for_stores_after(before))
            .await
            .unwrap()
            .unwrap();
        assert!(session.active_store().is_none());

        session.close_store();
        assert!(session.active_store().is_none());
    }
}
