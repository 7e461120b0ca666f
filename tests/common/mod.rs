//! Shared fixtures for the integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use moderation::{ContentStore, ContentStoreError, ContentType};

/// In-memory stand-in for the external content store.
///
/// Content is registered up front with its owners; hard deletes remove it
/// and are observable through [`FakeContentStore::was_deleted`].
#[derive(Default)]
pub struct FakeContentStore {
    owners: Mutex<HashMap<(ContentType, i64), Vec<i64>>>,
    deleted: Mutex<Vec<(ContentType, i64)>>,
}

impl FakeContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, content_type: ContentType, content_id: i64, owners: Vec<i64>) {
        self.owners
            .lock()
            .unwrap()
            .insert((content_type, content_id), owners);
    }

    pub fn was_deleted(&self, content_type: ContentType, content_id: i64) -> bool {
        self.deleted
            .lock()
            .unwrap()
            .contains(&(content_type, content_id))
    }
}

#[async_trait]
impl ContentStore for FakeContentStore {
    async fn owner_of(
        &self,
        content_type: ContentType,
        content_id: i64,
    ) -> Result<Vec<i64>, ContentStoreError> {
        self.owners
            .lock()
            .unwrap()
            .get(&(content_type, content_id))
            .cloned()
            .ok_or(ContentStoreError::NotFound {
                content_type,
                content_id,
            })
    }

    async fn hard_delete(
        &self,
        content_type: ContentType,
        content_id: i64,
    ) -> Result<(), ContentStoreError> {
        let removed = self
            .owners
            .lock()
            .unwrap()
            .remove(&(content_type, content_id));
        match removed {
            Some(_) => {
                self.deleted
                    .lock()
                    .unwrap()
                    .push((content_type, content_id));
                Ok(())
            }
            None => Err(ContentStoreError::NotFound {
                content_type,
                content_id,
            }),
        }
    }
}
