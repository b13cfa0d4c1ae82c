use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::model::Recipe;
use anyhow::Result;
use async_trait::async_trait;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A document collection holding one JSON document per recipe, keyed by name.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn insert(&self, recipe: &Recipe) -> Result<(), StoreError>;

    /// Replaces the document named `previous_name`. Returns `false` when no
    /// document matched.
    async fn replace(&self, previous_name: &str, recipe: &Recipe) -> Result<bool, StoreError>;

    /// Deleting a name that is not stored succeeds.
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Raw documents in insertion order.
    async fn find_all(&self) -> Result<Vec<String>, StoreError>;
}

pub fn is_valid_collection(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub struct Database {
    _db: LibsqlDatabase,
    conn: Connection,
    collection: String,
}

impl Database {
    pub async fn new(cfg: &StoreConfig, data_dir: &Path) -> Result<Self> {
        let path = if cfg.database == ":memory:" {
            PathBuf::from(&cfg.database)
        } else {
            data_dir.join(&cfg.database)
        };

        let db = match (&cfg.url, &cfg.auth_token) {
            (Some(url), Some(token)) => {
                tracing::info!("[db] running in synced database mode (offline writes)");
                let sync_interval = Duration::from_secs(cfg.sync_interval_seconds);
                Builder::new_synced_database(&path, url.clone(), token.clone())
                    .sync_interval(sync_interval)
                    .build()
                    .await?
            }
            _ => Builder::new_local(&path).build().await?,
        };

        Self::with_database(db, &cfg.collection).await
    }

    pub async fn in_memory(collection: &str) -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::with_database(db, collection).await
    }

    async fn with_database(db: LibsqlDatabase, collection: &str) -> Result<Self> {
        if !is_valid_collection(collection) {
            return Err(StoreError::InvalidCollection(collection.to_string()).into());
        }

        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        let schema = format!(
            r#"
CREATE TABLE IF NOT EXISTS {collection} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    document TEXT NOT NULL
)
"#
        );
        conn.execute(&schema, ())
            .await
            .map_err(|e| anyhow::anyhow!("failed to create collection {collection}: {e}"))?;
        tracing::info!(collection, "[db] collection ready");

        Ok(Database {
            _db: db,
            conn,
            collection: collection.to_string(),
        })
    }
}

#[async_trait]
impl RecipeStore for Database {
    async fn insert(&self, recipe: &Recipe) -> Result<(), StoreError> {
        let document = serde_json::to_string(recipe)?;
        let query = format!("INSERT INTO {} (name, document) VALUES (?, ?)", self.collection);
        self.conn
            .execute(&query, (recipe.name().to_string(), document))
            .await?;
        Ok(())
    }

    async fn replace(&self, previous_name: &str, recipe: &Recipe) -> Result<bool, StoreError> {
        let document = serde_json::to_string(recipe)?;
        let query = format!(
            "UPDATE {} SET name = ?, document = ? WHERE name = ?",
            self.collection
        );
        let affected = self
            .conn
            .execute(
                &query,
                (recipe.name().to_string(), document, previous_name.to_string()),
            )
            .await?;
        Ok(affected > 0)
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let query = format!("DELETE FROM {} WHERE name = ?", self.collection);
        let affected = self.conn.execute(&query, [name.to_string()]).await?;
        if affected == 0 {
            tracing::debug!(name, "[db] delete matched no document");
        }
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<String>, StoreError> {
        let query = format!("SELECT document FROM {} ORDER BY id", self.collection);
        let mut rows = self.conn.query(&query, ()).await?;
        let mut documents = vec![];

        while let Some(row) = rows.next().await? {
            documents.push(row.get::<String>(0)?);
        }

        Ok(documents)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// A store kept in a Vec that can be switched into failing every call.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        documents: Mutex<Vec<(String, String)>>,
        failing: AtomicBool,
    }

    impl MemoryStore {
        pub(crate) fn with_recipes(recipes: &[Recipe]) -> Self {
            let store = MemoryStore::default();
            for recipe in recipes {
                store.push_raw(recipe.name(), &serde_json::to_string(recipe).unwrap());
            }
            store
        }

        pub(crate) fn push_raw(&self, name: &str, document: &str) {
            self.documents
                .lock()
                .unwrap()
                .push((name.to_string(), document.to_string()));
        }

        pub(crate) fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub(crate) fn len(&self) -> usize {
            self.documents.lock().unwrap().len()
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::Database("connection reset".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RecipeStore for MemoryStore {
        async fn insert(&self, recipe: &Recipe) -> Result<(), StoreError> {
            self.check()?;
            let mut documents = self.documents.lock().unwrap();
            if documents.iter().any(|(name, _)| name == recipe.name()) {
                return Err(StoreError::Database("UNIQUE constraint failed".into()));
            }
            documents.push((recipe.name().to_string(), serde_json::to_string(recipe)?));
            Ok(())
        }

        async fn replace(&self, previous_name: &str, recipe: &Recipe) -> Result<bool, StoreError> {
            self.check()?;
            let mut documents = self.documents.lock().unwrap();
            match documents.iter_mut().find(|(name, _)| name == previous_name) {
                Some(entry) => {
                    *entry = (recipe.name().to_string(), serde_json::to_string(recipe)?);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete(&self, name: &str) -> Result<(), StoreError> {
            self.check()?;
            self.documents.lock().unwrap().retain(|(stored, _)| stored != name);
            Ok(())
        }

        async fn find_all(&self) -> Result<Vec<String>, StoreError> {
            self.check()?;
            Ok(self
                .documents
                .lock()
                .unwrap()
                .iter()
                .map(|(_, document)| document.clone())
                .collect())
        }
    }
}
