//! Cached CRUD shared by every catalog collection.

use std::sync::Arc;

use futures::TryStreamExt;
use mongodb::Collection;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::options::ReturnDocument;
use serde::Serialize;
use tracing::debug;

use super::{RepositoryError, Result, parse_id};
use crate::cache::{CacheKey, CacheManager, CacheValue, EntityKind, MutationEvent, MutationKind};
use crate::database::Database;

/// Maximum documents returned by an unfiltered list.
pub const LIST_LIMIT: i64 = 1000;

/// A top-level catalog record stored in its own collection.
pub trait CatalogDocument: CacheValue + Clone + Unpin + Sync + 'static {
    const KIND: EntityKind;

    /// Partial update applied with `$set`; `None` fields must not serialize.
    type Update: Serialize + Send + Sync;

    fn id(&self) -> Option<ObjectId>;

    fn set_id(&mut self, id: ObjectId);
}

/// One MongoDB collection behind the read-through cache.
pub struct CatalogCollection<T: CatalogDocument> {
    collection: Collection<T>,
    cache: Arc<CacheManager>,
}

impl<T: CatalogDocument> Clone for CatalogCollection<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            cache: self.cache.clone(),
        }
    }
}

impl<T> CatalogCollection<T>
where
    T: CatalogDocument,
    Vec<T>: CacheValue,
{
    pub fn new(db: &Database, cache: Arc<CacheManager>) -> Self {
        Self {
            collection: db.collection(T::KIND.collection()),
            cache,
        }
    }

    pub fn collection(&self) -> &Collection<T> {
        &self.collection
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// `list:<entities>`, at most [`LIST_LIMIT`] documents.
    pub async fn list(&self) -> Result<Vec<T>> {
        let key = CacheKey::list(T::KIND);
        self.cache
            .resolve_with_policy(&key, || async {
                let cursor = self.collection.find(doc! {}).limit(LIST_LIMIT).await?;
                let docs: Vec<T> = cursor.try_collect().await?;
                debug!(kind = %T::KIND, count = docs.len(), "Loaded list from MongoDB");
                Ok::<_, RepositoryError>(docs)
            })
            .await
    }

    /// `<entity>:<id>`. A missing record is reported, never cached.
    pub async fn get(&self, id: &str) -> Result<T> {
        let oid = parse_id(T::KIND, id)?;
        let key = CacheKey::item(T::KIND, &oid.to_hex())?;
        self.cache
            .resolve_with_policy(&key, || self.fetch(oid))
            .await
    }

    /// Uncached lookup by id.
    pub async fn fetch(&self, oid: ObjectId) -> Result<T> {
        debug!(kind = %T::KIND, id = %oid, "Loading from MongoDB");
        self.collection
            .find_one(doc! { "_id": oid })
            .await?
            .ok_or_else(|| not_found(T::KIND, oid))
    }

    /// Insert `record` and return it with its assigned id.
    pub async fn create(&self, mut record: T) -> Result<T> {
        let result = self.collection.insert_one(&record).await?;
        if let Some(oid) = result.inserted_id.as_object_id() {
            record.set_id(oid);
        }

        if let Some(oid) = record.id() {
            self.invalidate(MutationKind::Create, oid).await?;
        }
        Ok(record)
    }

    /// Apply the `Some` fields of `update`. An empty update writes nothing
    /// and returns the stored record.
    pub async fn update(&self, id: &str, update: &T::Update) -> Result<T> {
        let oid = parse_id(T::KIND, id)?;
        let set = mongodb::bson::to_document(update)?;
        if set.is_empty() {
            return self.fetch(oid).await;
        }

        let updated = self
            .collection
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| not_found(T::KIND, oid))?;

        self.invalidate(MutationKind::Update, oid).await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let oid = parse_id(T::KIND, id)?;
        let result = self.collection.delete_one(doc! { "_id": oid }).await?;
        if result.deleted_count == 0 {
            return Err(not_found(T::KIND, oid));
        }

        self.invalidate(MutationKind::Delete, oid).await
    }

    async fn invalidate(&self, mutation: MutationKind, oid: ObjectId) -> Result<()> {
        let event = MutationEvent::new(T::KIND, mutation, oid.to_hex());
        let report = self.cache.invalidate(&event).await?;
        debug!(event = %event, deleted = report.deleted_total(), "Write committed");
        Ok(())
    }
}

pub(crate) fn not_found(kind: EntityKind, oid: ObjectId) -> RepositoryError {
    RepositoryError::NotFound {
        kind,
        id: oid.to_hex(),
    }
}
