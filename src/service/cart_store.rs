//! Per-user carts persisted as one JSON document:
//! `{ "<user id>": { "<product id>": quantity } }`.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::InvenError;

/// product id -> quantity
pub type Cart = BTreeMap<i64, i64>;

type CartDocument = BTreeMap<String, BTreeMap<String, i64>>;

/// Serialises every read-modify-write of the cart file through one lock.
#[derive(Clone)]
pub struct CartStore {
    path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

impl CartStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self, user_id: i64) -> Result<Cart, InvenError> {
        let _guard = self.lock.lock().await;
        let doc = self.read_document().await?;
        Ok(user_cart(&doc, user_id))
    }

    /// Replace the user's cart; an empty cart removes the entry.
    pub async fn save(&self, user_id: i64, cart: &Cart) -> Result<(), InvenError> {
        let cart = cart.clone();
        self.update(user_id, move |c| {
            *c = cart;
            Ok(())
        })
        .await
        .map(|_| ())
    }

    pub async fn remove(&self, user_id: i64) -> Result<(), InvenError> {
        self.update(user_id, |c| {
            c.clear();
            Ok(())
        })
        .await
        .map(|_| ())
    }

    /// Apply `f` to the user's cart under the file lock. The file is rewritten
    /// only when `f` succeeds.
    pub async fn update<T, F>(&self, user_id: i64, f: F) -> Result<(T, Cart), InvenError>
    where
        F: FnOnce(&mut Cart) -> Result<T, InvenError>,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.read_document().await?;
        let mut cart = user_cart(&doc, user_id);
        let out = f(&mut cart)?;

        cart.retain(|_, qty| *qty > 0);
        let key = user_id.to_string();
        if cart.is_empty() {
            doc.remove(&key);
        } else {
            doc.insert(
                key,
                cart.iter().map(|(pid, qty)| (pid.to_string(), *qty)).collect(),
            );
        }
        self.write_document(&doc).await?;
        Ok((out, cart))
    }

    async fn read_document(&self) -> Result<CartDocument, InvenError> {
        let bytes = match tokio::fs::read(self.path.as_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CartDocument::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<CartDocument>(&bytes) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cart file is corrupt; starting empty");
                Ok(CartDocument::new())
            }
        }
    }

    async fn write_document(&self, doc: &CartDocument) -> Result<(), InvenError> {
        let json = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.path.as_path()).await?;
        debug!(path = %self.path.display(), users = doc.len(), "cart file written");
        Ok(())
    }
}

fn user_cart(doc: &CartDocument, user_id: i64) -> Cart {
    doc.get(&user_id.to_string())
        .map(|lines| {
            lines
                .iter()
                .filter_map(|(pid, qty)| pid.parse::<i64>().ok().map(|pid| (pid, *qty)))
                .filter(|(_, qty)| *qty > 0)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_path;

    #[tokio::test]
    async fn carts_are_isolated_per_user() {
        let path = temp_path("cart-users", "json");
        let store = CartStore::new(&path);

        store.save(1, &Cart::from([(10, 2), (11, 1)])).await.unwrap();
        store.save(2, &Cart::from([(10, 5)])).await.unwrap();
        store.remove(1).await.unwrap();

        assert!(store.load(1).await.unwrap().is_empty());
        assert_eq!(store.load(2).await.unwrap(), Cart::from([(10, 5)]));

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({"2": {"10": 5}}));

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_empty_and_failed_update_writes_nothing() {
        let path = temp_path("cart-corrupt", "json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = CartStore::new(&path);
        assert!(store.load(7).await.unwrap().is_empty());

        let err = store
            .update(7, |c| {
                c.insert(1, 1);
                Err::<(), _>(InvenError::validation("quantity", "nope"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, InvenError::Validation { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), b"{not json");

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let path = temp_path("cart-race", "json");
        let store = CartStore::new(&path);

        let mut tasks = Vec::new();
        for user in 0..8_i64 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                for _ in 0..5 {
                    store
                        .update(user, |c| {
                            *c.entry(42).or_insert(0) += 1;
                            Ok(())
                        })
                        .await
                        .unwrap();
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        for user in 0..8_i64 {
            assert_eq!(store.load(user).await.unwrap().get(&42), Some(&5));
        }

        let _ = std::fs::remove_file(&path);
    }
}
