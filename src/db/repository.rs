//! Database repository for CRUD operations.
//!
//! Every write runs in a transaction that also bumps the revision counter; the
//! matching change event is published only after the commit succeeds.

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::feed::{ChangeFeed, Topic};
use crate::models::{
    normalize_section, AllowedUsers, CreateListRequest, CreateStoreRequest, HistoryItem, Item,
    ListTemplate, QuickAddRequest, RevisionInfo, ShoppingList, Store, Trip, TripDetail,
    TripResult, UpdateItemRequest,
};
use crate::ordering::normalize_sections;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl Repository {
    pub async fn new(pool: SqlitePool) -> Result<Self, AppError> {
        let revision: i64 = sqlx::query_scalar("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&pool)
            .await?;
        Ok(Self {
            pool,
            feed: ChangeFeed::new(revision),
        })
    }

    /// Change feed fed by this repository's commits.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
        })
    }

    /// Bump the revision inside `tx`, commit, then announce `topics`.
    async fn commit(
        &self,
        mut tx: Transaction<'_, Sqlite>,
        topics: Vec<Topic>,
    ) -> Result<i64, AppError> {
        let now = timestamp();
        let revision: i64 = sqlx::query_scalar(
            "UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1 RETURNING revision_id",
        )
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        self.feed.publish(revision, topics);
        Ok(revision)
    }

    // ==================== ACCESS OPERATIONS ====================

    /// Get the allow-list.
    pub async fn allowed_users(&self) -> Result<AllowedUsers, AppError> {
        let uids: Vec<String> =
            sqlx::query_scalar("SELECT uid FROM allowed_users ORDER BY added_at, uid")
                .fetch_all(&self.pool)
                .await?;
        Ok(AllowedUsers { uids })
    }

    /// Check allow-list membership.
    pub async fn is_allowed(&self, uid: &str) -> Result<bool, AppError> {
        let found: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM allowed_users WHERE uid = ?)")
                .bind(uid)
                .fetch_one(&self.pool)
                .await?;
        Ok(found != 0)
    }

    /// Add a user id to the allow-list. Adding a present id changes nothing.
    pub async fn allow_user(&self, uid: &str) -> Result<AllowedUsers, AppError> {
        let uid = required(uid, "User id")?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("INSERT OR IGNORE INTO allowed_users (uid, added_at) VALUES (?, ?)")
            .bind(uid)
            .bind(timestamp())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() > 0 {
            self.commit(tx, vec![Topic::AccessList]).await?;
            tracing::info!(uid, "user added to allow-list");
        }
        self.allowed_users().await
    }

    /// Remove a user id from the allow-list.
    pub async fn revoke_user(&self, uid: &str) -> Result<AllowedUsers, AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM allowed_users WHERE uid = ?")
            .bind(uid)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "User {} is not on the allow-list",
                uid
            )));
        }

        self.commit(tx, vec![Topic::AccessList]).await?;
        tracing::info!(uid, "user removed from allow-list");
        self.allowed_users().await
    }

    /// Seed an empty allow-list. Returns the number of ids inserted.
    pub async fn seed_allowed_users(&self, uids: &[String]) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM allowed_users")
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 || uids.is_empty() {
            return Ok(0);
        }

        let now = timestamp();
        let mut inserted = 0;
        for uid in uids {
            let result =
                sqlx::query("INSERT OR IGNORE INTO allowed_users (uid, added_at) VALUES (?, ?)")
                    .bind(uid)
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;
            inserted += result.rows_affected() as usize;
        }

        self.commit(tx, vec![Topic::AccessList]).await?;
        Ok(inserted)
    }

    // ==================== LIST OPERATIONS ====================

    /// List active lists (most recently updated first) or archived lists.
    pub async fn list_lists(&self, archived: bool) -> Result<Vec<ShoppingList>, AppError> {
        let sql = if archived {
            "SELECT id, name, is_archived, archived_at, store_id, created_at, updated_at FROM lists WHERE is_archived = 1 ORDER BY archived_at DESC, id DESC"
        } else {
            "SELECT id, name, is_archived, archived_at, store_id, created_at, updated_at FROM lists WHERE is_archived = 0 ORDER BY updated_at DESC, id DESC"
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(list_from_row).collect())
    }

    /// Get a list by ID.
    pub async fn get_list(&self, id: &str) -> Result<Option<ShoppingList>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_list(&mut conn, id).await
    }

    /// Create a new list.
    pub async fn create_list(&self, request: &CreateListRequest) -> Result<ShoppingList, AppError> {
        let name = required(&request.name, "List name")?;
        let store_id = request
            .store_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let mut tx = self.pool.begin().await?;
        let list = insert_list(&mut tx, name, store_id).await?;
        self.commit(tx, vec![Topic::Lists]).await?;

        tracing::info!(list_id = %list.id, "list created");
        Ok(list)
    }

    /// Rename a list.
    pub async fn rename_list(&self, id: &str, name: &str) -> Result<ShoppingList, AppError> {
        let name = required(name, "List name")?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE lists SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(timestamp())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        self.finish_list_update(tx, id, result.rows_affected()).await
    }

    /// Archive (soft-delete) or restore a list.
    pub async fn set_list_archived(
        &self,
        id: &str,
        archived: bool,
    ) -> Result<ShoppingList, AppError> {
        let now = timestamp();
        let archived_at = archived.then(|| now.clone());

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE lists SET is_archived = ?, archived_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(archived as i32)
        .bind(&archived_at)
        .bind(&now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let list = self.finish_list_update(tx, id, result.rows_affected()).await?;
        tracing::info!(list_id = id, archived, "list archive state changed");
        Ok(list)
    }

    /// Point a list at a store layout, or clear it with `None`.
    ///
    /// The store is not required to exist.
    pub async fn assign_store(
        &self,
        id: &str,
        store_id: Option<String>,
    ) -> Result<ShoppingList, AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE lists SET store_id = ?, updated_at = ? WHERE id = ?")
            .bind(&store_id)
            .bind(timestamp())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        self.finish_list_update(tx, id, result.rows_affected()).await
    }

    async fn finish_list_update(
        &self,
        mut tx: Transaction<'_, Sqlite>,
        id: &str,
        rows_affected: u64,
    ) -> Result<ShoppingList, AppError> {
        if rows_affected == 0 {
            return Err(AppError::NotFound(format!("List {} not found", id)));
        }

        let list = fetch_list(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("List {} not found", id)))?;
        self.commit(tx, vec![Topic::Lists]).await?;
        Ok(list)
    }

    /// Permanently delete a list and its items.
    pub async fn delete_list(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM items WHERE list_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("List {} not found", id)));
        }

        self.commit(tx, vec![Topic::Lists, Topic::items(id)]).await?;
        tracing::info!(list_id = id, "list deleted");
        Ok(())
    }

    /// Create a list pre-filled with a template's items, as one batch.
    pub async fn create_list_from_template(
        &self,
        template: &ListTemplate,
        name: Option<&str>,
    ) -> Result<ShoppingList, AppError> {
        let name = match name.map(str::trim).filter(|s| !s.is_empty()) {
            Some(n) => n,
            None => template.name,
        };

        let mut tx = self.pool.begin().await?;
        let list = insert_list(&mut tx, name, None).await?;
        let now = timestamp();
        for text in template.items {
            insert_item(&mut tx, &list.id, text, None, &now).await?;
        }
        self.commit(tx, vec![Topic::Lists, Topic::items(&list.id)])
            .await?;

        tracing::info!(list_id = %list.id, template = template.id, "list created from template");
        Ok(list)
    }

    // ==================== ITEM OPERATIONS ====================

    /// List a list's items in creation order.
    pub async fn list_items(&self, list_id: &str) -> Result<Vec<Item>, AppError> {
        let mut conn = self.pool.acquire().await?;
        if fetch_list(&mut conn, list_id).await?.is_none() {
            return Err(AppError::NotFound(format!("List {} not found", list_id)));
        }

        let rows = sqlx::query(
            "SELECT id, list_id, text, section, checked, checked_at, note, created_at, updated_at FROM items WHERE list_id = ? ORDER BY created_at, id",
        )
        .bind(list_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.iter().map(item_from_row).collect())
    }

    /// Add every comma-separated entry of `request` in one batch.
    pub async fn quick_add(
        &self,
        list_id: &str,
        request: &QuickAddRequest,
    ) -> Result<Vec<Item>, AppError> {
        let parts = request.parts();
        if parts.is_empty() {
            return Err(AppError::Validation("Item text is required".to_string()));
        }
        let section = request.normalized_section();

        let mut tx = self.pool.begin().await?;
        if fetch_list(&mut tx, list_id).await?.is_none() {
            return Err(AppError::NotFound(format!("List {} not found", list_id)));
        }

        let now = timestamp();
        let mut items = Vec::with_capacity(parts.len());
        for text in &parts {
            items.push(insert_item(&mut tx, list_id, text, section.as_deref(), &now).await?);
        }
        sqlx::query("UPDATE lists SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(list_id)
            .execute(&mut *tx)
            .await?;

        self.commit(tx, vec![Topic::items(list_id), Topic::Lists])
            .await?;
        tracing::info!(list_id, count = items.len(), "items added");
        Ok(items)
    }

    /// Update text, note, section or checked state of an item.
    ///
    /// Checking stamps `checkedAt`; unchecking clears it. An empty note or
    /// section clears that field.
    pub async fn update_item(
        &self,
        list_id: &str,
        item_id: &str,
        request: &UpdateItemRequest,
    ) -> Result<Item, AppError> {
        let text = match &request.text {
            Some(t) => Some(required(t, "Item text")?.to_string()),
            None => None,
        };

        let mut tx = self.pool.begin().await?;
        let existing = fetch_item(&mut tx, list_id, item_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Item {} not found", item_id)))?;

        let now = timestamp();
        let text = text.unwrap_or(existing.text);
        let note = match &request.note {
            Some(n) => Some(n.trim()).filter(|n| !n.is_empty()).map(str::to_string),
            None => existing.note,
        };
        let section = match &request.section {
            Some(s) => normalize_section(Some(s)),
            None => existing.section,
        };
        let checked = request.checked.unwrap_or(existing.checked);
        let checked_at = match (existing.checked, checked) {
            (false, true) => Some(now.clone()),
            (_, false) => None,
            (true, true) => existing.checked_at,
        };

        sqlx::query(
            "UPDATE items SET text = ?, note = ?, section = ?, checked = ?, checked_at = ?, updated_at = ? WHERE id = ? AND list_id = ?",
        )
        .bind(&text)
        .bind(&note)
        .bind(&section)
        .bind(checked as i32)
        .bind(&checked_at)
        .bind(&now)
        .bind(item_id)
        .bind(list_id)
        .execute(&mut *tx)
        .await?;

        self.commit(tx, vec![Topic::items(list_id)]).await?;

        Ok(Item {
            id: existing.id,
            list_id: existing.list_id,
            text,
            section,
            checked,
            checked_at,
            note,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// Delete an item.
    pub async fn delete_item(&self, list_id: &str, item_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM items WHERE id = ? AND list_id = ?")
            .bind(item_id)
            .bind(list_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Item {} not found", item_id)));
        }

        self.commit(tx, vec![Topic::items(list_id)]).await?;
        Ok(())
    }

    // ==================== STORE OPERATIONS ====================

    /// List all stores in creation order.
    pub async fn list_stores(&self) -> Result<Vec<Store>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, sections, created_at, updated_at FROM stores ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(store_from_row).collect())
    }

    /// Get a store by ID.
    pub async fn get_store(&self, id: &str) -> Result<Option<Store>, AppError> {
        let row = sqlx::query(
            "SELECT id, name, sections, created_at, updated_at FROM stores WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(store_from_row))
    }

    /// Create a new store.
    pub async fn create_store(&self, request: &CreateStoreRequest) -> Result<Store, AppError> {
        let name = required(&request.name, "Store name")?;
        let sections = normalize_sections(&request.sections)?;
        let sections_json = sections_to_json(&sections)?;
        let id = new_id();
        let now = timestamp();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO stores (id, name, sections, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(&sections_json)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        self.commit(tx, vec![Topic::Stores]).await?;

        tracing::info!(store_id = %id, "store created");
        Ok(Store {
            id,
            name: name.to_string(),
            sections,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Rename a store.
    pub async fn rename_store(&self, id: &str, name: &str) -> Result<Store, AppError> {
        let name = required(name, "Store name")?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE stores SET name = ?, updated_at = ? WHERE id = ?")
            .bind(name)
            .bind(timestamp())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Store {} not found", id)));
        }

        self.commit(tx, vec![Topic::Stores]).await?;
        self.require_store(id).await
    }

    /// Overwrite a store's entire section sequence (last write wins).
    pub async fn replace_sections(
        &self,
        id: &str,
        sections: Vec<String>,
    ) -> Result<Store, AppError> {
        let sections_json = sections_to_json(&sections)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE stores SET sections = ?, updated_at = ? WHERE id = ?")
            .bind(&sections_json)
            .bind(timestamp())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Store {} not found", id)));
        }

        self.commit(tx, vec![Topic::Stores]).await?;
        tracing::info!(store_id = id, sections = sections.len(), "store sections replaced");
        self.require_store(id).await
    }

    /// Read the store, apply `edit` to its sections and write the result back.
    ///
    /// `edit` errors abort before anything is written.
    pub async fn edit_sections<F>(&self, id: &str, edit: F) -> Result<Store, AppError>
    where
        F: FnOnce(&[String]) -> Result<Vec<String>, AppError>,
    {
        let store = self.require_store(id).await?;
        let next = edit(&store.sections)?;
        self.replace_sections(id, next).await
    }

    /// Delete a store. Lists pointing at it fall back to unordered display.
    pub async fn delete_store(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM stores WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Store {} not found", id)));
        }

        self.commit(tx, vec![Topic::Stores]).await?;
        tracing::info!(store_id = id, "store deleted");
        Ok(())
    }

    async fn require_store(&self, id: &str) -> Result<Store, AppError> {
        self.get_store(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Store {} not found", id)))
    }

    // ==================== TRIP OPERATIONS ====================

    /// Move every checked item of a list into a new history trip.
    ///
    /// The trip record, its history items and the deletions commit together in
    /// one transaction; on any error nothing is persisted.
    pub async fn complete_trip(
        &self,
        list_id: &str,
        completed_by: &str,
    ) -> Result<TripResult, AppError> {
        let mut tx = self.pool.begin().await?;

        let list = fetch_list(&mut tx, list_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("List {} not found", list_id)))?;

        let rows = sqlx::query(
            "SELECT id, list_id, text, section, checked, checked_at, note, created_at, updated_at FROM items WHERE list_id = ? AND checked = 1 ORDER BY created_at, id",
        )
        .bind(list_id)
        .fetch_all(&mut *tx)
        .await?;
        let checked: Vec<Item> = rows.iter().map(item_from_row).collect();

        if checked.is_empty() {
            return Err(AppError::EmptyTrip(format!(
                "List {} has no checked items",
                list_id
            )));
        }

        let trip_id = new_id();
        let now = timestamp();
        let item_count = checked.len() as i64;

        sqlx::query(
            "INSERT INTO history_trips (id, list_id, list_name, completed_at, completed_by, item_count) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&trip_id)
        .bind(list_id)
        .bind(&list.name)
        .bind(&now)
        .bind(completed_by)
        .bind(item_count)
        .execute(&mut *tx)
        .await?;

        for (position, item) in checked.iter().enumerate() {
            sqlx::query(
                "INSERT INTO history_items (id, trip_id, position, text, note, checked_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(&trip_id)
            .bind(position as i64)
            .bind(&item.text)
            .bind(item.note.as_deref().unwrap_or_default())
            .bind(item.checked_at.as_deref().unwrap_or(&now))
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM items WHERE id = ?")
                .bind(&item.id)
                .execute(&mut *tx)
                .await?;
        }

        self.commit(tx, vec![Topic::items(list_id), Topic::History])
            .await?;

        tracing::info!(list_id, trip_id = %trip_id, item_count, "trip completed");
        Ok(TripResult {
            trip_id,
            moved_count: item_count,
        })
    }

    /// List trips, most recent first.
    pub async fn list_trips(&self) -> Result<Vec<Trip>, AppError> {
        let rows = sqlx::query(
            "SELECT id, list_id, list_name, completed_at, completed_by, item_count FROM history_trips ORDER BY completed_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(trip_from_row).collect())
    }

    /// Get a trip with its history items.
    pub async fn get_trip(&self, id: &str) -> Result<Option<TripDetail>, AppError> {
        let row = sqlx::query(
            "SELECT id, list_id, list_name, completed_at, completed_by, item_count FROM history_trips WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(trip) = row.as_ref().map(trip_from_row) else {
            return Ok(None);
        };

        let rows = sqlx::query(
            "SELECT text, note, checked_at FROM history_items WHERE trip_id = ? ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(TripDetail {
            trip,
            items: rows.iter().map(history_item_from_row).collect(),
        }))
    }
}

// Helper functions for shared statements

async fn fetch_list(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<ShoppingList>, AppError> {
    let row = sqlx::query(
        "SELECT id, name, is_archived, archived_at, store_id, created_at, updated_at FROM lists WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(list_from_row))
}

async fn fetch_item(
    conn: &mut SqliteConnection,
    list_id: &str,
    item_id: &str,
) -> Result<Option<Item>, AppError> {
    let row = sqlx::query(
        "SELECT id, list_id, text, section, checked, checked_at, note, created_at, updated_at FROM items WHERE id = ? AND list_id = ?",
    )
    .bind(item_id)
    .bind(list_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(item_from_row))
}

async fn insert_list(
    conn: &mut SqliteConnection,
    name: &str,
    store_id: Option<&str>,
) -> Result<ShoppingList, AppError> {
    let id = new_id();
    let now = timestamp();

    sqlx::query(
        "INSERT INTO lists (id, name, is_archived, archived_at, store_id, created_at, updated_at) VALUES (?, ?, 0, NULL, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(store_id)
    .bind(&now)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(ShoppingList {
        id,
        name: name.to_string(),
        is_archived: false,
        archived_at: None,
        store_id: store_id.map(str::to_string),
        created_at: now.clone(),
        updated_at: now,
    })
}

async fn insert_item(
    conn: &mut SqliteConnection,
    list_id: &str,
    text: &str,
    section: Option<&str>,
    now: &str,
) -> Result<Item, AppError> {
    let id = new_id();

    sqlx::query(
        "INSERT INTO items (id, list_id, text, section, checked, checked_at, note, created_at, updated_at) VALUES (?, ?, ?, ?, 0, NULL, NULL, ?, ?)",
    )
    .bind(&id)
    .bind(list_id)
    .bind(text)
    .bind(section)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(Item {
        id,
        list_id: list_id.to_string(),
        text: text.to_string(),
        section: section.map(str::to_string),
        checked: false,
        checked_at: None,
        note: None,
        created_at: now.to_string(),
        updated_at: now.to_string(),
    })
}

// Helper functions for row conversion

fn list_from_row(row: &SqliteRow) -> ShoppingList {
    let is_archived: i32 = row.get("is_archived");
    ShoppingList {
        id: row.get("id"),
        name: row.get("name"),
        is_archived: is_archived != 0,
        archived_at: row.get("archived_at"),
        store_id: row.get("store_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn item_from_row(row: &SqliteRow) -> Item {
    let checked: i32 = row.get("checked");
    Item {
        id: row.get("id"),
        list_id: row.get("list_id"),
        text: row.get("text"),
        section: row.get("section"),
        checked: checked != 0,
        checked_at: row.get("checked_at"),
        note: row.get("note"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn store_from_row(row: &SqliteRow) -> Store {
    let sections: String = row.get("sections");
    Store {
        id: row.get("id"),
        name: row.get("name"),
        sections: parse_json_array(&sections),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn trip_from_row(row: &SqliteRow) -> Trip {
    Trip {
        id: row.get("id"),
        list_id: row.get("list_id"),
        list_name: row.get("list_name"),
        completed_at: row.get("completed_at"),
        completed_by: row.get("completed_by"),
        item_count: row.get("item_count"),
    }
}

fn history_item_from_row(row: &SqliteRow) -> HistoryItem {
    HistoryItem {
        text: row.get("text"),
        note: row.get("note"),
        checked_at: row.get("checked_at"),
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn sections_to_json(sections: &[String]) -> Result<String, AppError> {
    serde_json::to_string(sections)
        .map_err(|e| AppError::Internal(format!("Failed to encode sections: {}", e)))
}

/// Trimmed, non-blank input or a validation error naming `field`.
fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// Fixed-width UTC timestamp; lexical order equals chronological order.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Time-ordered id, so id order follows creation order within a timestamp.
fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Repository) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.db")).await.unwrap();
        let repo = Repository::new(pool).await.unwrap();
        (temp_dir, repo)
    }

    async fn list_with_items(repo: &Repository, text: &str) -> (ShoppingList, Vec<Item>) {
        let list = repo
            .create_list(&CreateListRequest {
                name: "Weekly".to_string(),
                store_id: None,
            })
            .await
            .unwrap();
        let items = repo
            .quick_add(
                &list.id,
                &QuickAddRequest {
                    text: text.to_string(),
                    section: None,
                },
            )
            .await
            .unwrap();
        (list, items)
    }

    async fn check(repo: &Repository, item: &Item) {
        repo.update_item(
            &item.list_id,
            &item.id,
            &UpdateItemRequest {
                checked: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_complete_trip_failure_persists_nothing() {
        let (_dir, repo) = setup().await;
        let (list, items) = list_with_items(&repo, "Milk, Eggs, Bread").await;
        check(&repo, &items[0]).await;
        check(&repo, &items[1]).await;

        sqlx::query("DROP TABLE history_items")
            .execute(&repo.pool)
            .await
            .unwrap();
        let revision = repo.get_revision_id().await.unwrap();

        let err = repo.complete_trip(&list.id, "alice").await.unwrap_err();
        assert_eq!(err.error_code(), "BACKEND_ERROR");

        let remaining = repo.list_items(&list.id).await.unwrap();
        assert_eq!(remaining.len(), 3);
        assert_eq!(remaining.iter().filter(|i| i.checked).count(), 2);
        assert!(repo.list_trips().await.unwrap().is_empty());
        assert_eq!(repo.get_revision_id().await.unwrap(), revision);
    }

    #[tokio::test]
    async fn test_complete_trip_keeps_unchecked_items() {
        let (_dir, repo) = setup().await;
        let (list, items) = list_with_items(&repo, "Milk, Eggs, Bread").await;
        check(&repo, &items[0]).await;
        check(&repo, &items[2]).await;

        let result = repo.complete_trip(&list.id, "alice").await.unwrap();
        assert_eq!(result.moved_count, 2);

        let remaining = repo.list_items(&list.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, items[1].id);

        let trip = repo.get_trip(&result.trip_id).await.unwrap().unwrap();
        assert_eq!(trip.trip.item_count, 2);
        assert_eq!(trip.trip.completed_by, "alice");
        let texts: Vec<&str> = trip.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["Milk", "Bread"]);
    }

    #[tokio::test]
    async fn test_seed_only_fills_empty_allow_list() {
        let (_dir, repo) = setup().await;
        let seeded = repo
            .seed_allowed_users(&["alice".to_string(), "bob".to_string()])
            .await
            .unwrap();
        assert_eq!(seeded, 2);

        let seeded = repo.seed_allowed_users(&["carol".to_string()]).await.unwrap();
        assert_eq!(seeded, 0);
        assert!(repo.is_allowed("bob").await.unwrap());
        assert!(!repo.is_allowed("carol").await.unwrap());
        assert!(repo.allowed_users().await.unwrap().contains("alice"));
    }

    #[tokio::test]
    async fn test_commit_publishes_topics() {
        let (_dir, repo) = setup().await;
        let mut events = repo.feed().subscribe_events();
        let (list, _) = list_with_items(&repo, "Milk").await;

        let created = events.recv().await.unwrap();
        assert_eq!(created.topics, vec![Topic::Lists]);
        let added = events.recv().await.unwrap();
        assert!(added.touches(&Topic::items(&list.id)));
        assert_eq!(added.revision, created.revision + 1);
        assert_eq!(repo.feed().current_revision(), added.revision);
    }

    #[test]
    fn test_required_trims_and_rejects_blank() {
        assert_eq!(required("  Mart ", "Store name").unwrap(), "Mart");
        assert_eq!(
            required(" \t", "Store name").unwrap_err(),
            AppError::Validation("Store name is required".to_string())
        );
    }

    #[test]
    fn test_new_ids_sort_in_creation_order() {
        let ids: Vec<String> = (0..50).map(|_| new_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_timestamp_is_fixed_width_utc() {
        let ts = timestamp();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000000Z".len());
    }
}
