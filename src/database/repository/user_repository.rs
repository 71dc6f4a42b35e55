//! User repository.

use std::sync::Arc;

use mongodb::bson::oid::ObjectId;

use super::Result;
use super::catalog::{CatalogCollection, CatalogDocument};
use crate::cache::{CacheManager, EntityKind};
use crate::database::Database;
use crate::database::models::{User, UserUpdate};

impl CatalogDocument for User {
    const KIND: EntityKind = EntityKind::User;
    type Update = UserUpdate;

    fn id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

#[derive(Clone)]
pub struct UserRepository {
    users: CatalogCollection<User>,
}

impl UserRepository {
    pub fn new(db: &Database, cache: Arc<CacheManager>) -> Self {
        Self {
            users: CatalogCollection::new(db, cache),
        }
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.users.list().await
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        self.users.get(id).await
    }

    pub async fn create(&self, user: User) -> Result<User> {
        self.users.create(user).await
    }

    pub async fn update(&self, id: &str, update: &UserUpdate) -> Result<User> {
        self.users.update(id, update).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.users.delete(id).await
    }
}
