// src/store/memory.rs
use super::{Store, StoreError};
use crate::models::{Holding, Order, Position, User};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Collections {
    users: HashMap<String, User>,
    holdings: Vec<Holding>,
    positions: Vec<Position>,
    orders: Vec<Order>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_portfolio(holdings: Vec<Holding>, positions: Vec<Position>) -> Self {
        MemoryStore {
            inner: RwLock::new(Collections {
                holdings,
                positions,
                ..Collections::default()
            }),
        }
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.inner.read().await.orders.clone()
    }

    pub async fn user_count(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(email).cloned())
    }

    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&user.email) {
            return Err(StoreError::DuplicateKey);
        }
        inner.users.insert(user.email.clone(), user);
        Ok(())
    }

    async fn all_holdings(&self) -> Result<Vec<Holding>, StoreError> {
        Ok(self.inner.read().await.holdings.clone())
    }

    async fn all_positions(&self) -> Result<Vec<Position>, StoreError> {
        Ok(self.inner.read().await.positions.clone())
    }

    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        self.inner.write().await.orders.push(order);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        User {
            id: format!("id-{}", email),
            name: "A".to_string(),
            email: email.to_string(),
            phone: "1".to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_user_rejects_duplicate_email() {
        let store = MemoryStore::new();
        store.insert_user(user("a@x.com")).await.unwrap();

        let second = store.insert_user(user("a@x.com")).await;
        assert!(matches!(second, Err(StoreError::DuplicateKey)));
        assert_eq!(store.user_count().await, 1);
    }

    #[tokio::test]
    async fn test_find_user_by_email() {
        let store = MemoryStore::new();
        store.insert_user(user("a@x.com")).await.unwrap();

        let found = store.find_user_by_email("a@x.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some("id-a@x.com".to_string()));
        assert!(store.find_user_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_orders_are_kept_in_submission_order() {
        let store = MemoryStore::new();
        for (name, mode) in [("INFY", "BUY"), ("TCS", "SELL")] {
            store
                .insert_order(Order {
                    name: name.to_string(),
                    qty: 1.0,
                    price: 10.0,
                    mode: mode.to_string(),
                })
                .await
                .unwrap();
        }

        let names: Vec<_> = store.orders().await.into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["INFY", "TCS"]);
    }

    #[tokio::test]
    async fn test_empty_portfolio() {
        let store = MemoryStore::new();
        assert!(store.all_holdings().await.unwrap().is_empty());
        assert!(store.all_positions().await.unwrap().is_empty());
    }
}
