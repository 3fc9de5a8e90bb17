//! Persistence seam.
//!
//! Handlers talk to `Arc<dyn Store>`; [`ScyllaStore`] backs production and
//! [`MemoryStore`] backs local development and tests.

mod memory;
mod scylla_store;

pub use self::memory::MemoryStore;
pub use self::scylla_store::ScyllaStore;

use crate::models::{Holding, Order, Position, User};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database unavailable: {0}")]
    Unavailable(String),
    #[error("record already exists")]
    DuplicateKey,
    #[error("query failed: {0}")]
    Query(String),
    #[error("malformed row: {0}")]
    Decode(String),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Fails with [`StoreError::DuplicateKey`] when the email is already taken.
    async fn insert_user(&self, user: User) -> Result<(), StoreError>;

    async fn all_holdings(&self) -> Result<Vec<Holding>, StoreError>;

    async fn all_positions(&self) -> Result<Vec<Position>, StoreError>;

    async fn insert_order(&self, order: Order) -> Result<(), StoreError>;
}
