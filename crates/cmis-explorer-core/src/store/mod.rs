//! Storage abstraction for favorites.
//!
//! The [`FavoriteStore`] trait is the only way screens read or change
//! bookmarks. Implementations must be `Send + Sync` so a single handle can
//! be shared between the shell and background tasks.
//!
//! # Contract
//!
//! | Method | Behavior |
//! |--------|----------|
//! | [`add`](FavoriteStore::add) | Insert, or refresh the snapshot of an existing (server, url) pair in place |
//! | [`find_all`](FavoriteStore::find_all) | All favorites of one server, in insertion order |
//! | [`get`](FavoriteStore::get) | One favorite by id |
//! | [`delete`](FavoriteStore::delete) | `Ok(false)` when the id does not exist |
//!
//! Every mutation is atomic: a reader never observes a half-applied add or
//! delete.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Favorite, NewFavorite};

#[async_trait]
pub trait FavoriteStore: Send + Sync {
    /// Store a favorite and return it with its assigned id.
    async fn add(&self, favorite: &NewFavorite) -> Result<Favorite, StoreError>;

    /// All favorites of `server_id`, oldest first.
    async fn find_all(&self, server_id: &str) -> Result<Vec<Favorite>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Favorite>, StoreError>;

    /// Remove a favorite. Returns whether anything was removed.
    async fn delete(&self, id: i64) -> Result<bool, StoreError>;
}
