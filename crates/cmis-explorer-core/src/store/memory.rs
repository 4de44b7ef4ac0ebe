//! In-memory [`FavoriteStore`] for tests and embedders without a database.
//!
//! All state sits behind one `std::sync::RwLock`, so every mutation is
//! applied under a single write guard.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StoreError;
use crate::models::{Favorite, NewFavorite};

use super::FavoriteStore;

#[derive(Default)]
struct Inner {
    next_id: i64,
    favorites: Vec<Favorite>,
}

/// In-memory favorite store.
#[derive(Default)]
pub struct InMemoryFavoriteStore {
    inner: RwLock<Inner>,
}

impl InMemoryFavoriteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::StorageFailure("favorite store lock poisoned".to_string())
}

#[async_trait]
impl FavoriteStore for InMemoryFavoriteStore {
    async fn add(&self, favorite: &NewFavorite) -> Result<Favorite, StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;

        if let Some(existing) = inner
            .favorites
            .iter_mut()
            .find(|f| f.server_id == favorite.server_id && f.url == favorite.url)
        {
            existing.display_name = favorite.display_name.clone();
            existing.mimetype = favorite.mimetype.clone();
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let stored = Favorite {
            id: inner.next_id,
            server_id: favorite.server_id.clone(),
            url: favorite.url.clone(),
            display_name: favorite.display_name.clone(),
            mimetype: favorite.mimetype.clone(),
            created_at: Utc::now(),
        };
        inner.favorites.push(stored.clone());
        Ok(stored)
    }

    async fn find_all(&self, server_id: &str) -> Result<Vec<Favorite>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .favorites
            .iter()
            .filter(|f| f.server_id == server_id)
            .cloned()
            .collect())
    }

    async fn get(&self, id: i64) -> Result<Option<Favorite>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.favorites.iter().find(|f| f.id == id).cloned())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let before = inner.favorites.len();
        inner.favorites.retain(|f| f.id != id);
        Ok(inner.favorites.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_fav(server: &str, url: &str, name: &str) -> NewFavorite {
        NewFavorite {
            server_id: server.into(),
            url: url.into(),
            display_name: name.into(),
            mimetype: "application/pdf".into(),
        }
    }

    #[tokio::test]
    async fn test_add_then_find_all_in_insertion_order() {
        let store = InMemoryFavoriteStore::new();
        store.add(&new_fav("s1", "http://a", "A")).await.unwrap();
        store.add(&new_fav("s2", "http://b", "B")).await.unwrap();
        store.add(&new_fav("s1", "http://c", "C")).await.unwrap();

        let names: Vec<String> = store
            .find_all("s1")
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.display_name)
            .collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_re_adding_same_url_updates_in_place() {
        let store = InMemoryFavoriteStore::new();
        let first = store.add(&new_fav("s1", "http://a", "A")).await.unwrap();
        store.add(&new_fav("s1", "http://b", "B")).await.unwrap();
        let again = store.add(&new_fav("s1", "http://a", "A2")).await.unwrap();

        assert_eq!(first.id, again.id);
        let all = store.find_all("s1").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].display_name, "A2");
    }

    #[tokio::test]
    async fn test_delete_unknown_id_returns_false() {
        let store = InMemoryFavoriteStore::new();
        let fav = store.add(&new_fav("s1", "http://a", "A")).await.unwrap();

        assert!(!store.delete(fav.id + 100).await.unwrap());
        assert_eq!(store.find_all("s1").await.unwrap().len(), 1);

        assert!(store.delete(fav.id).await.unwrap());
        assert!(store.find_all("s1").await.unwrap().is_empty());
        assert!(store.get(fav.id).await.unwrap().is_none());
    }
}
