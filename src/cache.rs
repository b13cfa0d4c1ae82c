//! In-memory mirror of the recipe collection.
//!
//! Reads are served from a snapshot and never touch the store. Writes and the
//! periodic reload go through one write gate: a mutation persists to the store
//! first and only then patches the book, and a reload swaps the whole book
//! only after every stored document parsed. A reload can therefore never
//! interleave with a half-applied mutation, and a failed reload leaves the
//! last-known-good book in place.

use crate::db::RecipeStore;
use crate::error::{AppError, ReloadError, StoreError};
use crate::model::{Recipe, RecipeBook};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Loading,
    Ready,
}

pub struct RecipeCache {
    book: RwLock<RecipeBook>,
    ready: AtomicBool,
    write_gate: Mutex<()>,
}

impl Default for RecipeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeCache {
    pub fn new() -> Self {
        RecipeCache {
            book: RwLock::new(RecipeBook::new()),
            ready: AtomicBool::new(false),
            write_gate: Mutex::new(()),
        }
    }

    pub fn status(&self) -> CacheStatus {
        if self.ready.load(Ordering::Acquire) {
            CacheStatus::Ready
        } else {
            CacheStatus::Loading
        }
    }

    pub async fn snapshot(&self) -> RecipeBook {
        self.book.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.book.read().await.len()
    }

    /// Rebuilds the book from every stored document. Returns the number of
    /// recipes loaded.
    pub async fn reload(&self, store: &dyn RecipeStore) -> Result<usize, ReloadError> {
        let _gate = self.write_gate.lock().await;

        let documents = store.find_all().await?;
        let recipes = documents
            .iter()
            .enumerate()
            .map(|(index, document)| {
                Recipe::from_document(document)
                    .map_err(|source| ReloadError::InvalidDocument { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let count = recipes.len();
        *self.book.write().await = RecipeBook::from_recipes(recipes);
        self.ready.store(true, Ordering::Release);
        Ok(count)
    }

    pub async fn add_recipe(&self, store: &dyn RecipeStore, recipe: Recipe) -> Result<Recipe, AppError> {
        let _gate = self.write_gate.lock().await;

        if self.book.read().await.name_taken(recipe.name(), None) {
            return Err(AppError::Conflict(recipe.name().to_string()));
        }

        store.insert(&recipe).await.map_err(AppError::store("store"))?;
        self.book.write().await.add(recipe.clone());
        tracing::info!(name = recipe.name(), "recipe created");
        Ok(recipe)
    }

    pub async fn replace_recipe(
        &self,
        store: &dyn RecipeStore,
        previous_name: &str,
        recipe: Recipe,
    ) -> Result<Recipe, AppError> {
        let _gate = self.write_gate.lock().await;

        if self.book.read().await.name_taken(recipe.name(), Some(previous_name)) {
            return Err(AppError::Conflict(recipe.name().to_string()));
        }

        let matched = store
            .replace(previous_name, &recipe)
            .await
            .map_err(AppError::store("update"))?;
        if !matched {
            return Err(AppError::NotFound(previous_name.to_string()));
        }

        self.book.write().await.replace(previous_name, recipe.clone());
        tracing::info!(name = recipe.name(), previous_name, "recipe replaced");
        Ok(recipe)
    }

    pub async fn delete_recipe(&self, store: &dyn RecipeStore, name: &str) -> Result<(), AppError> {
        let _gate = self.write_gate.lock().await;

        store.delete(name).await.map_err(AppError::store("delete"))?;
        self.book.write().await.remove(name);
        tracing::info!(name, "recipe deleted");
        Ok(())
    }

    /// Writes every cached recipe back to the store under its own name,
    /// re-serialising each document in the current schema.
    pub async fn rewrite_stored(&self, store: &dyn RecipeStore) -> Result<usize, StoreError> {
        let _gate = self.write_gate.lock().await;
        let book = self.book.read().await.clone();

        let mut rewritten = 0;
        for recipe in book.recipes() {
            if store.replace(recipe.name(), recipe).await? {
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }
}

/// One periodic refresh. Failures are logged and never propagated.
pub async fn refresh(cache: &RecipeCache, store: &dyn RecipeStore) {
    match cache.reload(store).await {
        Ok(count) => tracing::debug!(recipes = count, "recipe cache reloaded"),
        Err(e) => tracing::error!(
            error = %crate::unpack_error(&e),
            "recipe cache reload failed, keeping previous recipes"
        ),
    }
}

/// Rewrites stored documents, but only once the first load succeeded.
/// Returns the number of documents rewritten.
pub async fn rewrite_after_load(cache: &RecipeCache, store: &dyn RecipeStore) -> Option<usize> {
    if cache.status() != CacheStatus::Ready {
        tracing::error!("recipe cache never loaded, not rewriting stored recipes");
        return None;
    }

    match cache.rewrite_stored(store).await {
        Ok(count) => {
            tracing::info!(recipes = count, "rewrote stored recipes");
            Some(count)
        }
        Err(e) => {
            tracing::error!(error = %crate::unpack_error(&e), "failed to rewrite stored recipes");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fake::MemoryStore;
    use crate::model::tests::recipe;

    fn names(book: &RecipeBook) -> Vec<&str> {
        book.recipes().iter().map(Recipe::name).collect()
    }

    #[tokio::test]
    async fn test_starts_loading_and_empty() {
        let cache = RecipeCache::new();
        assert_eq!(cache.status(), CacheStatus::Loading);
        assert!(cache.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_reload_replaces_book() {
        let store = MemoryStore::with_recipes(&[recipe("Toast"), recipe("Soup")]);
        let cache = RecipeCache::new();

        assert_eq!(cache.reload(&store).await.unwrap(), 2);
        assert_eq!(cache.status(), CacheStatus::Ready);
        assert_eq!(names(&cache.snapshot().await), ["Toast", "Soup"]);
    }

    #[tokio::test]
    async fn test_reload_with_malformed_record_keeps_previous_book() {
        let store = MemoryStore::with_recipes(&[recipe("Toast")]);
        let cache = RecipeCache::new();
        cache.reload(&store).await.unwrap();
        let before = cache.snapshot().await;

        store.insert(&recipe("Soup")).await.unwrap();
        store.push_raw("Broken", r#"{"name":"Broken","serves":"4"}"#);

        let err = cache.reload(&store).await.unwrap_err();
        assert!(matches!(err, ReloadError::InvalidDocument { index: 2, .. }));
        assert_eq!(cache.snapshot().await, before);
        assert_eq!(cache.status(), CacheStatus::Ready);
    }

    #[tokio::test]
    async fn test_reload_store_failure_keeps_loading() {
        let store = MemoryStore::default();
        store.set_failing(true);
        let cache = RecipeCache::new();

        assert!(matches!(cache.reload(&store).await, Err(ReloadError::Store(_))));
        assert_eq!(cache.status(), CacheStatus::Loading);
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let store = MemoryStore::default();
        let cache = RecipeCache::new();

        cache.add_recipe(&store, recipe("Toast")).await.unwrap();
        let err = cache.add_recipe(&store, recipe("Toast")).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(ref name) if name == "Toast"));
        assert_eq!(names(&cache.snapshot().await), ["Toast"]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_leaves_cache_untouched() {
        let store = MemoryStore::with_recipes(&[recipe("Toast")]);
        let cache = RecipeCache::new();
        cache.reload(&store).await.unwrap();
        store.set_failing(true);

        let err = cache.add_recipe(&store, recipe("Soup")).await.unwrap_err();
        assert!(matches!(err, AppError::StoreFailure { action: "store", .. }));

        let err = cache.delete_recipe(&store, "Toast").await.unwrap_err();
        assert!(matches!(err, AppError::StoreFailure { action: "delete", .. }));

        let err = cache
            .replace_recipe(&store, "Toast", recipe("French Toast"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StoreFailure { action: "update", .. }));

        assert_eq!(names(&cache.snapshot().await), ["Toast"]);
    }

    #[tokio::test]
    async fn test_replace_renames_and_moves_to_end() {
        let store = MemoryStore::with_recipes(&[recipe("Toast"), recipe("Soup")]);
        let cache = RecipeCache::new();
        cache.reload(&store).await.unwrap();

        cache
            .replace_recipe(&store, "Toast", recipe("French Toast"))
            .await
            .unwrap();
        assert_eq!(names(&cache.snapshot().await), ["Soup", "French Toast"]);
    }

    #[tokio::test]
    async fn test_replace_keeping_name_is_allowed() {
        let store = MemoryStore::with_recipes(&[recipe("Toast")]);
        let cache = RecipeCache::new();
        cache.reload(&store).await.unwrap();

        cache.replace_recipe(&store, "Toast", recipe("Toast")).await.unwrap();
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_replace_onto_other_name_conflicts() {
        let store = MemoryStore::with_recipes(&[recipe("Toast"), recipe("Soup")]);
        let cache = RecipeCache::new();
        cache.reload(&store).await.unwrap();

        let err = cache.replace_recipe(&store, "Toast", recipe("Soup")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_replace_missing_previous_name_is_not_found() {
        let store = MemoryStore::default();
        let cache = RecipeCache::new();

        let err = cache.replace_recipe(&store, "Toast", recipe("Soup")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref name) if name == "Toast"));
        assert!(cache.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_name_succeeds() {
        let store = MemoryStore::with_recipes(&[recipe("Toast")]);
        let cache = RecipeCache::new();
        cache.reload(&store).await.unwrap();

        cache.delete_recipe(&store, "Pancakes").await.unwrap();
        assert_eq!(names(&cache.snapshot().await), ["Toast"]);
    }

    #[tokio::test]
    async fn test_rewrite_skipped_when_never_loaded() {
        let store = MemoryStore::with_recipes(&[recipe("Toast")]);
        store.set_failing(true);
        let cache = RecipeCache::new();
        refresh(&cache, &store).await;
        store.set_failing(false);

        assert_eq!(rewrite_after_load(&cache, &store).await, None);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_after_successful_load() {
        let store = MemoryStore::with_recipes(&[recipe("Toast")]);
        let cache = RecipeCache::new();
        refresh(&cache, &store).await;

        assert_eq!(rewrite_after_load(&cache, &store).await, Some(1));
    }

    #[tokio::test]
    async fn test_rewrite_stored() {
        let store = MemoryStore::with_recipes(&[recipe("Toast"), recipe("Soup")]);
        let cache = RecipeCache::new();
        cache.reload(&store).await.unwrap();

        assert_eq!(cache.rewrite_stored(&store).await.unwrap(), 2);
        assert_eq!(store.len(), 2);
    }
}
